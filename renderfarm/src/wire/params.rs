use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Type of a parameter, without its values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Int,
    Bool,
    Float,
    Point,
    Vector,
    Normal,
    Color,
    String,
    Texture,
}

/// Typed values of one parameter
///
/// Every parameter holds an array, single values are arrays of length one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(Vec<i32>),
    Bool(Vec<bool>),
    Float(Vec<f32>),
    Point(Vec<[f32; 3]>),
    Vector(Vec<[f32; 3]>),
    Normal(Vec<[f32; 3]>),
    Color(Vec<[f32; 3]>),
    String(Vec<String>),
    /// Names of textures
    Texture(Vec<String>),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Point(_) => ParamKind::Point,
            ParamValue::Vector(_) => ParamKind::Vector,
            ParamValue::Normal(_) => ParamKind::Normal,
            ParamValue::Color(_) => ParamKind::Color,
            ParamValue::String(_) => ParamKind::String,
            ParamValue::Texture(_) => ParamKind::Texture,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ParamValue::Int(v) => v.len(),
            ParamValue::Bool(v) => v.len(),
            ParamValue::Float(v) => v.len(),
            ParamValue::Point(v) | ParamValue::Vector(v) | ParamValue::Normal(v) => v.len(),
            ParamValue::Color(v) => v.len(),
            ParamValue::String(v) | ParamValue::Texture(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamItem {
    pub name: String,
    pub value: ParamValue,
}

/// Ordered multimap of named, typed parameters
///
/// Used to construct every scene entity. Order of insertion is kept,
/// also across the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet {
    items: Vec<ParamItem>,
}

impl ParamSet {
    pub fn new() -> ParamSet {
        ParamSet { items: Vec::new() }
    }

    /// Add parameter
    ///
    /// Parameter of the same name and kind is replaced,
    /// the new one goes to the end.
    pub fn add(&mut self, name: &str, value: ParamValue) {
        self.erase(value.kind(), name);
        self.items.push(ParamItem {
            name: name.to_owned(),
            value,
        });
    }

    /// Builder-style `add`
    pub fn with(mut self, name: &str, value: ParamValue) -> ParamSet {
        self.add(name, value);
        self
    }

    pub fn add_int(&mut self, name: &str, value: i32) {
        self.add(name, ParamValue::Int(vec![value]));
    }

    pub fn add_bool(&mut self, name: &str, value: bool) {
        self.add(name, ParamValue::Bool(vec![value]));
    }

    pub fn add_float(&mut self, name: &str, value: f32) {
        self.add(name, ParamValue::Float(vec![value]));
    }

    pub fn add_string(&mut self, name: &str, value: &str) {
        self.add(name, ParamValue::String(vec![value.to_owned()]));
    }

    pub fn add_point(&mut self, name: &str, value: Point3<f32>) {
        self.add(name, ParamValue::Point(vec![[value.x, value.y, value.z]]));
    }

    /// Remove parameter of given kind and name
    /// Returns `true` if anything was removed
    pub fn erase(&mut self, kind: ParamKind, name: &str) -> bool {
        let before = self.items.len();
        self.items
            .retain(|item| !(item.name == name && item.value.kind() == kind));
        before != self.items.len()
    }

    pub fn find(&self, kind: ParamKind, name: &str) -> Option<&ParamValue> {
        self.items
            .iter()
            .find(|item| item.name == name && item.value.kind() == kind)
            .map(|item| &item.value)
    }

    pub fn find_one_int(&self, name: &str, default: i32) -> i32 {
        match self.find(ParamKind::Int, name) {
            Some(ParamValue::Int(v)) if v.len() == 1 => v[0],
            _ => default,
        }
    }

    pub fn find_one_bool(&self, name: &str, default: bool) -> bool {
        match self.find(ParamKind::Bool, name) {
            Some(ParamValue::Bool(v)) if v.len() == 1 => v[0],
            _ => default,
        }
    }

    pub fn find_one_float(&self, name: &str, default: f32) -> f32 {
        match self.find(ParamKind::Float, name) {
            Some(ParamValue::Float(v)) if v.len() == 1 => v[0],
            _ => default,
        }
    }

    pub fn find_one_string<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        match self.find(ParamKind::String, name) {
            Some(ParamValue::String(v)) if v.len() == 1 => v[0].as_str(),
            _ => default,
        }
    }

    pub fn find_one_point(&self, name: &str, default: Point3<f32>) -> Point3<f32> {
        match self.find(ParamKind::Point, name) {
            Some(ParamValue::Point(v)) if v.len() == 1 => Point3::from(v[0]),
            _ => default,
        }
    }

    pub fn find_one_vector(&self, name: &str, default: Vector3<f32>) -> Vector3<f32> {
        match self.find(ParamKind::Vector, name) {
            Some(ParamValue::Vector(v)) if v.len() == 1 => Vector3::from(v[0]),
            _ => default,
        }
    }

    pub fn find_one_color(&self, name: &str, default: [f32; 3]) -> [f32; 3] {
        match self.find(ParamKind::Color, name) {
            Some(ParamValue::Color(v)) if v.len() == 1 => v[0],
            _ => default,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::point;

    #[test]
    fn add_replaces_same_kind() {
        let mut ps = ParamSet::new();
        ps.add_string("mapname", "a.png");
        ps.add_int("mapname", 3);
        ps.add_string("mapname", "b.png");

        assert_eq!(ps.len(), 2);
        assert_eq!(ps.find_one_string("mapname", ""), "b.png");
        assert_eq!(ps.find_one_int("mapname", 0), 3);
        // Replaced item moved to the back
        assert_eq!(ps.iter().last().unwrap().value.kind(), ParamKind::String);
    }

    #[test]
    fn erase_only_matching_kind() {
        let mut ps = ParamSet::new();
        ps.add_bool("write_png", true);
        ps.add_float("write_png", 1.0);

        assert!(ps.erase(ParamKind::Bool, "write_png"));
        assert!(!ps.erase(ParamKind::Bool, "write_png"));
        assert_eq!(ps.find_one_float("write_png", 0.0), 1.0);
    }

    #[test]
    fn defaults_on_missing_or_arrays() {
        let ps = ParamSet::new()
            .with("xresolution", ParamValue::Int(vec![1, 2]))
            .with("from", ParamValue::Point(vec![[1.0, 2.0, 3.0]]));

        assert_eq!(ps.find_one_int("xresolution", 42), 42);
        assert_eq!(ps.find_one_int("yresolution", 7), 7);
        assert_eq!(
            ps.find_one_point("from", point![0.0, 0.0, 0.0]),
            point![1.0, 2.0, 3.0]
        );
    }
}
