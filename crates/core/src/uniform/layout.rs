use std::{collections::HashSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{ExprVizError, Result};

/// Representation a field takes inside the packed byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WireType {
    Float32,
    Float64,
}

impl WireType {
    pub fn size(self) -> usize {
        match self {
            WireType::Float32 => std::mem::size_of::<f32>(),
            WireType::Float64 => std::mem::size_of::<f64>(),
        }
    }
}

/// Type a caller declares a field with. Double precision keeps its full
/// width on the wire; every other type travels as a 32-bit float. Offsets
/// are computed from the wire size, never from the host type's width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    #[default]
    F32,
    F64,
    I32,
    U32,
}

impl FieldType {
    pub fn wire_type(self) -> WireType {
        match self {
            FieldType::F64 => WireType::Float64,
            FieldType::F32 | FieldType::I32 | FieldType::U32 => WireType::Float32,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::F32 => "f32",
            FieldType::F64 => "f64",
            FieldType::I32 => "i32",
            FieldType::U32 => "u32",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = ExprVizError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "f32" | "float" | "float32" => Ok(FieldType::F32),
            "f64" | "double" | "float64" => Ok(FieldType::F64),
            "i32" | "int" | "int32" => Ok(FieldType::I32),
            "u32" | "uint" | "uint32" => Ok(FieldType::U32),
            "void" | "()" => Err(ExprVizError::layout(format!(
                "type `{s}` has no size and cannot be a uniform field"
            ))),
            other => Err(ExprVizError::layout(format!(
                "type `{other}` has no uniform wire representation"
            ))),
        }
    }
}

impl TryFrom<String> for FieldType {
    type Error = ExprVizError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

/// One field of a parameter struct as declared by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformFieldDecl {
    pub name: String,
    #[serde(default)]
    pub ty: FieldType,
    /// Initial value.
    #[serde(default)]
    pub value: f64,
}

impl UniformFieldDecl {
    pub fn new(name: impl Into<String>, ty: FieldType, value: f64) -> Self {
        Self {
            name: name.into(),
            ty,
            value,
        }
    }

    pub fn float(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, FieldType::F32, value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub ty: FieldType,
    pub wire: WireType,
    pub size: usize,
    pub offset: usize,
}

/// Packed layout: fields in declaration order, each starting where the
/// previous one ends. No alignment padding is inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    size: usize,
}

impl UniformLayout {
    pub fn compute(declarations: &[UniformFieldDecl]) -> Result<Self> {
        if declarations.is_empty() {
            return Err(ExprVizError::layout("a uniform struct needs at least one field"));
        }
        let mut names = HashSet::new();
        let mut fields = Vec::with_capacity(declarations.len());
        let mut offset = 0;
        for declaration in declarations {
            if declaration.name.is_empty() {
                return Err(ExprVizError::layout("uniform fields need a name"));
            }
            if !names.insert(declaration.name.as_str()) {
                return Err(ExprVizError::layout(format!(
                    "field `{}` is declared twice",
                    declaration.name
                )));
            }
            let wire = declaration.ty.wire_type();
            let size = wire.size();
            fields.push(UniformField {
                name: declaration.name.clone(),
                ty: declaration.ty,
                wire,
                size,
                offset,
            });
            offset += size;
        }
        Ok(Self {
            fields,
            size: offset,
        })
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    /// Total size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field(&self, index: usize) -> Option<&UniformField> {
        self.fields.get(index)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn floats(names: &[&str]) -> Vec<UniformFieldDecl> {
        names.iter().map(|n| UniformFieldDecl::float(*n, 0.0)).collect()
    }

    #[test]
    fn packs_fields_in_declaration_order() {
        let layout = UniformLayout::compute(&floats(&["a", "b", "c", "radius"])).unwrap();
        let offsets: Vec<usize> = layout.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8, 12]);
        assert_eq!(layout.size(), 16);
        assert_eq!(layout.index_of("radius"), Some(3));
    }

    #[test]
    fn double_precision_fields_keep_their_width() {
        let declarations = vec![
            UniformFieldDecl::new("wide", FieldType::F64, 0.0),
            UniformFieldDecl::new("b", FieldType::F32, 0.0),
            UniformFieldDecl::new("n", FieldType::I32, 0.0),
        ];
        let layout = UniformLayout::compute(&declarations).unwrap();
        assert_eq!(layout.fields()[0].wire, WireType::Float64);
        assert_eq!(layout.fields()[0].size, 8);
        assert_eq!(layout.fields()[1].offset, 8);
        assert_eq!(layout.fields()[2].offset, 12);
        assert_eq!(layout.fields()[2].wire, WireType::Float32);
        assert_eq!(layout.size(), 16);
    }

    #[test]
    fn duplicate_and_empty_declarations_are_layout_errors() {
        assert!(matches!(
            UniformLayout::compute(&floats(&["a", "a"])),
            Err(ExprVizError::Layout(_))
        ));
        assert!(matches!(
            UniformLayout::compute(&[]),
            Err(ExprVizError::Layout(_))
        ));
    }

    #[test]
    fn type_names_parse_or_fail_with_layout_errors() {
        assert_eq!("float".parse::<FieldType>().unwrap(), FieldType::F32);
        assert_eq!("double".parse::<FieldType>().unwrap(), FieldType::F64);
        assert!(matches!("void".parse::<FieldType>(), Err(ExprVizError::Layout(_))));
        assert!(matches!("mat4".parse::<FieldType>(), Err(ExprVizError::Layout(_))));
    }

    #[test]
    fn declarations_deserialize_from_json() {
        let declarations: Vec<UniformFieldDecl> = serde_json::from_str(
            r#"[{ "name": "a" }, { "name": "radius", "ty": "double", "value": 0.2 }]"#,
        )
        .unwrap();
        assert_eq!(declarations[0].ty, FieldType::F32);
        assert_eq!(declarations[1].ty, FieldType::F64);
        assert_eq!(declarations[1].value, 0.2);

        let bad = r#"[{ "name": "a", "ty": "void" }]"#;
        assert!(serde_json::from_str::<Vec<UniformFieldDecl>>(bad).is_err());
    }

    proptest! {
        #[test]
        fn offsets_are_prefix_sums(types in prop::collection::vec(0usize..4, 1..16)) {
            let all = [FieldType::F32, FieldType::F64, FieldType::I32, FieldType::U32];
            let declarations: Vec<UniformFieldDecl> = types
                .iter()
                .enumerate()
                .map(|(i, &t)| UniformFieldDecl::new(format!("f{i}"), all[t], 0.0))
                .collect();
            let layout = UniformLayout::compute(&declarations).unwrap();

            let mut expected = 0;
            for field in layout.fields() {
                prop_assert_eq!(field.offset, expected);
                expected += field.size;
            }
            prop_assert_eq!(layout.size(), expected);
            let wide = types.iter().filter(|&&t| all[t] == FieldType::F64).count();
            prop_assert_eq!(layout.size(), 4 * declarations.len() + 4 * wide);
        }
    }
}
