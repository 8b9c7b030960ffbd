//! Cluster/attribute schema lookup interface and canonical wire
//! types.
//!
//! The concrete schema source (IDL, XML, generated tables) is an
//! external collaborator; the engine only consumes the
//! [`SchemaRegistry`] lookup. [`StaticSchemaRegistry`] is the
//! in-memory implementation used by tests and the CLI.

use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;

/// A canonical wire type tag, optionally nullable.
///
/// The numeric bounds returned by [`WireType::bounds`] are a
/// compatibility contract with the published protocol
/// specification; the `type` constraint rejects values outside
/// them. For `nullable_*` tags the maximum is one less than the
/// non-nullable counterpart because the all-ones pattern is
/// reserved to represent null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireType {
    pub kind: WireKind,
    pub nullable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    Int8u,
    Int16u,
    Int24u,
    Int32u,
    Int48u,
    Int56u,
    Int64u,
    Int8s,
    Int16s,
    Int24s,
    Int32s,
    Int48s,
    Int56s,
    Int64s,
    Bitmap8,
    Bitmap16,
    Bitmap32,
    Bitmap64,
    Enum8,
    Enum16,
    Percent,
    Percent100ths,
    NodeId,
    GroupId,
    EndpointNo,
    ClusterId,
    AttributeId,
    FieldId,
    CommandId,
    EventId,
    ActionId,
    TransactionId,
    VendorId,
    DeviceTypeId,
    FabricIdx,
    EpochUs,
    EpochS,
    Utc,
    Date,
    Tod,
    Single,
    Double,
    Boolean,
    List,
    CharString,
    LongCharString,
    OctetString,
    LongOctetString,
}

impl WireType {
    /// Parse a canonical tag string, accepting the `nullable_`
    /// prefix.
    pub fn parse(tag: &str) -> Option<WireType> {
        let (nullable, base) = match tag.strip_prefix("nullable_") {
            Some(rest) => (true, rest),
            None => (false, tag),
        };
        let kind = match base {
            "int8u" => WireKind::Int8u,
            "int16u" => WireKind::Int16u,
            "int24u" => WireKind::Int24u,
            "int32u" => WireKind::Int32u,
            "int48u" => WireKind::Int48u,
            "int56u" => WireKind::Int56u,
            "int64u" => WireKind::Int64u,
            "int8s" => WireKind::Int8s,
            "int16s" => WireKind::Int16s,
            "int24s" => WireKind::Int24s,
            "int32s" => WireKind::Int32s,
            "int48s" => WireKind::Int48s,
            "int56s" => WireKind::Int56s,
            "int64s" => WireKind::Int64s,
            "bitmap8" => WireKind::Bitmap8,
            "bitmap16" => WireKind::Bitmap16,
            "bitmap32" => WireKind::Bitmap32,
            "bitmap64" => WireKind::Bitmap64,
            "enum8" => WireKind::Enum8,
            "enum16" => WireKind::Enum16,
            "Percent" | "percent" => WireKind::Percent,
            "Percent100ths" | "percent100ths" => WireKind::Percent100ths,
            "node_id" => WireKind::NodeId,
            "group_id" => WireKind::GroupId,
            "endpoint_no" => WireKind::EndpointNo,
            "cluster_id" => WireKind::ClusterId,
            "attribute_id" => WireKind::AttributeId,
            "field_id" => WireKind::FieldId,
            "command_id" => WireKind::CommandId,
            "event_id" => WireKind::EventId,
            "action_id" => WireKind::ActionId,
            "transaction_id" => WireKind::TransactionId,
            "vendor_id" => WireKind::VendorId,
            "devtype_id" | "device_type_id" => WireKind::DeviceTypeId,
            "fabric_idx" => WireKind::FabricIdx,
            "epoch_us" => WireKind::EpochUs,
            "epoch_s" => WireKind::EpochS,
            "utc" => WireKind::Utc,
            "date" => WireKind::Date,
            "tod" => WireKind::Tod,
            "single" => WireKind::Single,
            "double" => WireKind::Double,
            "boolean" => WireKind::Boolean,
            "list" => WireKind::List,
            "char_string" => WireKind::CharString,
            "long_char_string" => WireKind::LongCharString,
            "octet_string" => WireKind::OctetString,
            "long_octet_string" => WireKind::LongOctetString,
            _ => return None,
        };
        Some(WireType { kind, nullable })
    }

    /// Integer bounds for numeric tags; `None` for strings, lists,
    /// booleans, and floats.
    pub fn bounds(&self) -> Option<(i128, i128)> {
        use WireKind::*;
        let (min, max): (i128, i128) = match self.kind {
            Int8u | Bitmap8 | Enum8 | Percent => (0, 0xFF),
            Int16u | Bitmap16 | Enum16 | Percent100ths | VendorId | GroupId | EndpointNo => {
                (0, 0xFFFF)
            }
            Int24u => (0, 0xFF_FFFF),
            Int32u | Bitmap32 | ClusterId | AttributeId | FieldId | CommandId | EventId
            | ActionId | TransactionId | DeviceTypeId | EpochS | Utc | Date | Tod => {
                (0, 0xFFFF_FFFF)
            }
            Int48u => (0, 0xFFFF_FFFF_FFFF),
            Int56u => (0, 0xFF_FFFF_FFFF_FFFF),
            Int64u | Bitmap64 | NodeId | EpochUs => (0, u64::MAX as i128),
            Int8s => (i8::MIN as i128, i8::MAX as i128),
            Int16s => (i16::MIN as i128, i16::MAX as i128),
            Int24s => (-0x80_0000, 0x7F_FFFF),
            Int32s => (i32::MIN as i128, i32::MAX as i128),
            Int48s => (-0x8000_0000_0000, 0x7FFF_FFFF_FFFF),
            Int56s => (-0x80_0000_0000_0000, 0x7F_FFFF_FFFF_FFFF),
            Int64s => (i64::MIN as i128, i64::MAX as i128),
            FabricIdx => (0, 0xFE),
            Single | Double | Boolean | List | CharString | LongCharString | OctetString
            | LongOctetString => return None,
        };
        if self.nullable {
            Some((min, max - 1))
        } else {
            Some((min, max))
        }
    }

    /// True for the 64-bit-wide integer family whose literals may
    /// arrive as strings because they do not round-trip through a
    /// host double.
    pub fn is_wide_integer(&self) -> bool {
        matches!(
            self.kind,
            WireKind::Int64u
                | WireKind::Int64s
                | WireKind::Bitmap64
                | WireKind::NodeId
                | WireKind::EpochUs
                | WireKind::EpochS
                | WireKind::Utc
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self.kind, WireKind::Single | WireKind::Double)
    }

    pub fn is_octet_string(&self) -> bool {
        matches!(self.kind, WireKind::OctetString | WireKind::LongOctetString)
    }

    pub fn is_char_string(&self) -> bool {
        matches!(self.kind, WireKind::CharString | WireKind::LongCharString)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.kind, WireKind::Boolean)
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, WireKind::List)
    }

    /// Canonical tag string, including the `nullable_` prefix.
    pub fn tag(&self) -> String {
        use WireKind::*;
        let base = match self.kind {
            Int8u => "int8u",
            Int16u => "int16u",
            Int24u => "int24u",
            Int32u => "int32u",
            Int48u => "int48u",
            Int56u => "int56u",
            Int64u => "int64u",
            Int8s => "int8s",
            Int16s => "int16s",
            Int24s => "int24s",
            Int32s => "int32s",
            Int48s => "int48s",
            Int56s => "int56s",
            Int64s => "int64s",
            Bitmap8 => "bitmap8",
            Bitmap16 => "bitmap16",
            Bitmap32 => "bitmap32",
            Bitmap64 => "bitmap64",
            Enum8 => "enum8",
            Enum16 => "enum16",
            Percent => "Percent",
            Percent100ths => "Percent100ths",
            NodeId => "node_id",
            GroupId => "group_id",
            EndpointNo => "endpoint_no",
            ClusterId => "cluster_id",
            AttributeId => "attribute_id",
            FieldId => "field_id",
            CommandId => "command_id",
            EventId => "event_id",
            ActionId => "action_id",
            TransactionId => "transaction_id",
            VendorId => "vendor_id",
            DeviceTypeId => "devtype_id",
            FabricIdx => "fabric_idx",
            EpochUs => "epoch_us",
            EpochS => "epoch_s",
            Utc => "utc",
            Date => "date",
            Tod => "tod",
            Single => "single",
            Double => "double",
            Boolean => "boolean",
            List => "list",
            CharString => "char_string",
            LongCharString => "long_char_string",
            OctetString => "octet_string",
            LongOctetString => "long_octet_string",
        };
        if self.nullable {
            format!("nullable_{base}")
        } else {
            base.to_string()
        }
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// The resolved type of a field: a primitive wire type, a nested
/// struct of sub-fields, or unknown (no schema entry — the coercer
/// passes values through untouched).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldType {
    Scalar(WireType),
    Struct(IndexMap<String, FieldType>),
    #[default]
    Unknown,
}

impl FieldType {
    /// The sub-type of a named field. For `Struct` this looks up
    /// the sub-field map; a `Scalar` applies to every name (the
    /// attribute-shorthand case); `Unknown` stays unknown.
    pub fn field(&self, name: &str) -> FieldType {
        match self {
            FieldType::Struct(map) => map.get(name).cloned().unwrap_or(FieldType::Unknown),
            other => other.clone(),
        }
    }
}

/// Lookup interface resolving `(cluster, field)` pairs to wire
/// types. Purely read-only.
pub trait SchemaRegistry: Send + Sync {
    fn resolve_field(&self, cluster: &str, field: &str) -> FieldType;

    /// Annotation only; not required for validation correctness.
    fn is_fabric_scoped(&self, _cluster: &str, _target: &str) -> bool {
        false
    }

    /// Annotation only; not required for validation correctness.
    fn is_nullable(&self, cluster: &str, target: &str) -> bool {
        matches!(
            self.resolve_field(cluster, target),
            FieldType::Scalar(WireType { nullable: true, .. })
        )
    }
}

/// A registry with no entries; every lookup is `Unknown`.
#[derive(Debug, Default)]
pub struct EmptySchemaRegistry;

impl SchemaRegistry for EmptySchemaRegistry {
    fn resolve_field(&self, _cluster: &str, _field: &str) -> FieldType {
        FieldType::Unknown
    }
}

/// In-memory registry built from `(cluster, field) -> type` entries.
///
/// Loadable from a small YAML document of the shape
/// `ClusterName: { FieldName: tag | { SubField: tag } }`.
#[derive(Debug, Default)]
pub struct StaticSchemaRegistry {
    entries: IndexMap<String, IndexMap<String, FieldType>>,
}

impl StaticSchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cluster: &str, field: &str, ty: FieldType) -> &mut Self {
        self.entries
            .entry(cluster.to_string())
            .or_default()
            .insert(field.to_string(), ty);
        self
    }

    /// Convenience for scalar entries: `tag` must be a canonical
    /// wire type tag.
    pub fn insert_scalar(&mut self, cluster: &str, field: &str, tag: &str) -> &mut Self {
        if let Some(wire) = WireType::parse(tag) {
            self.insert(cluster, field, FieldType::Scalar(wire));
        }
        self
    }

    /// Build a registry from a parsed YAML mapping of clusters to
    /// field maps. Unrecognized tags are skipped with a warning.
    pub fn from_value(doc: &Value) -> Self {
        let mut registry = Self::new();
        let Value::Map(clusters) = doc else {
            return registry;
        };
        for (cluster, fields) in clusters {
            let Value::Map(fields) = fields else { continue };
            for (field, spec) in fields {
                match Self::field_type_from_value(spec) {
                    Some(ty) => {
                        registry.insert(cluster, field, ty);
                    }
                    None => {
                        tracing::warn!(
                            "skipping schema entry {}.{}: unrecognized type {}",
                            cluster,
                            field,
                            spec
                        );
                    }
                }
            }
        }
        registry
    }

    fn field_type_from_value(spec: &Value) -> Option<FieldType> {
        match spec {
            Value::Str(tag) => WireType::parse(tag).map(FieldType::Scalar),
            Value::Map(sub) => {
                let mut fields = IndexMap::new();
                for (name, sub_spec) in sub {
                    fields.insert(name.clone(), Self::field_type_from_value(sub_spec)?);
                }
                Some(FieldType::Struct(fields))
            }
            _ => None,
        }
    }
}

impl SchemaRegistry for StaticSchemaRegistry {
    fn resolve_field(&self, cluster: &str, field: &str) -> FieldType {
        self.entries
            .get(cluster)
            .and_then(|fields| fields.get(field))
            .cloned()
            .unwrap_or(FieldType::Unknown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_nullable_tags() {
        let ty = WireType::parse("int8u").unwrap();
        assert_eq!(ty.kind, WireKind::Int8u);
        assert!(!ty.nullable);

        let ty = WireType::parse("nullable_int16u").unwrap();
        assert_eq!(ty.kind, WireKind::Int16u);
        assert!(ty.nullable);

        assert!(WireType::parse("not_a_type").is_none());
    }

    #[test]
    fn unsigned_bounds_match_the_specification() {
        assert_eq!(WireType::parse("int8u").unwrap().bounds(), Some((0, 0xFF)));
        assert_eq!(WireType::parse("int16u").unwrap().bounds(), Some((0, 0xFFFF)));
        assert_eq!(
            WireType::parse("int32u").unwrap().bounds(),
            Some((0, 0xFFFF_FFFF))
        );
        assert_eq!(
            WireType::parse("int64u").unwrap().bounds(),
            Some((0, 0xFFFF_FFFF_FFFF_FFFF))
        );
        assert_eq!(WireType::parse("Percent").unwrap().bounds(), Some((0, 0xFF)));
        assert_eq!(
            WireType::parse("Percent100ths").unwrap().bounds(),
            Some((0, 0xFFFF))
        );
        assert_eq!(
            WireType::parse("node_id").unwrap().bounds(),
            Some((0, 0xFFFF_FFFF_FFFF_FFFF))
        );
        assert_eq!(
            WireType::parse("cluster_id").unwrap().bounds(),
            Some((0, 0xFFFF_FFFF))
        );
        assert_eq!(
            WireType::parse("vendor_id").unwrap().bounds(),
            Some((0, 0xFFFF))
        );
    }

    #[test]
    fn signed_bounds_match_the_specification() {
        assert_eq!(WireType::parse("int8s").unwrap().bounds(), Some((-128, 127)));
        assert_eq!(
            WireType::parse("int64s").unwrap().bounds(),
            Some((i64::MIN as i128, i64::MAX as i128))
        );
    }

    #[test]
    fn nullable_caps_the_maximum_one_below() {
        assert_eq!(
            WireType::parse("nullable_int8u").unwrap().bounds(),
            Some((0, 0xFE))
        );
        assert_eq!(
            WireType::parse("nullable_int64u").unwrap().bounds(),
            Some((0, u64::MAX as i128 - 1))
        );
    }

    #[test]
    fn bitmaps_share_unsigned_bounds() {
        assert_eq!(WireType::parse("bitmap8").unwrap().bounds(), Some((0, 0xFF)));
        assert_eq!(
            WireType::parse("bitmap64").unwrap().bounds(),
            Some((0, u64::MAX as i128))
        );
    }

    #[test]
    fn static_registry_resolves_and_defaults_to_unknown() {
        let mut registry = StaticSchemaRegistry::new();
        registry.insert_scalar("OnOff", "OnTime", "int16u");

        match registry.resolve_field("OnOff", "OnTime") {
            FieldType::Scalar(ty) => assert_eq!(ty.kind, WireKind::Int16u),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(
            registry.resolve_field("OnOff", "Missing"),
            FieldType::Unknown
        );
        assert_eq!(
            registry.resolve_field("NoSuchCluster", "OnTime"),
            FieldType::Unknown
        );
    }

    #[test]
    fn registry_from_yaml_value_handles_nested_structs() {
        let doc: Value = serde_yaml::from_str(
            "ColorControl:\n  ColorLoopSet:\n    UpdateFlags: bitmap8\n    Time: int16u\n  CurrentHue: int8u\n",
        )
        .unwrap();
        let registry = StaticSchemaRegistry::from_value(&doc);

        match registry.resolve_field("ColorControl", "ColorLoopSet") {
            FieldType::Struct(fields) => {
                assert!(matches!(fields.get("Time"), Some(FieldType::Scalar(_))));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            registry.resolve_field("ColorControl", "CurrentHue"),
            FieldType::Scalar(_)
        ));
    }
}
