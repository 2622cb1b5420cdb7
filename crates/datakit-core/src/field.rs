//! Field metadata declared by entities.

/// Logical type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    UnsignedInteger,
    UnsignedBigInt,
    Float,
    Double,
    Decimal,
    Text,
    Bytes,
    DateTime,
    Json,
}

impl FieldType {
    /// Whether values of this type are numbers.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::TinyInt
                | FieldType::SmallInt
                | FieldType::Integer
                | FieldType::BigInt
                | FieldType::UnsignedInteger
                | FieldType::UnsignedBigInt
                | FieldType::Float
                | FieldType::Double
                | FieldType::Decimal
        )
    }

    /// Lower-case type name, used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            FieldType::Boolean => "boolean",
            FieldType::TinyInt => "tinyint",
            FieldType::SmallInt => "smallint",
            FieldType::Integer => "integer",
            FieldType::BigInt => "bigint",
            FieldType::UnsignedInteger => "unsigned integer",
            FieldType::UnsignedBigInt => "unsigned bigint",
            FieldType::Float => "float",
            FieldType::Double => "double",
            FieldType::Decimal => "decimal",
            FieldType::Text => "text",
            FieldType::Bytes => "bytes",
            FieldType::DateTime => "datetime",
            FieldType::Json => "json",
        }
    }
}

/// Metadata about an entity field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Field name as it appears in the entity's serialized form.
    pub name: &'static str,
    /// Logical type.
    pub field_type: FieldType,
    /// Whether the field may be null.
    pub nullable: bool,
    /// Whether the field is part of the declared primary key.
    pub primary_key: bool,
}

impl FieldInfo {
    /// Create a new non-nullable, non-key field.
    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            nullable: false,
            primary_key: false,
        }
    }

    /// Set nullable flag.
    pub const fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set primary key flag.
    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }
}
