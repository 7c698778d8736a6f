use serde::{Deserialize, Serialize};

/// Stock codes matched by a saved condition, in the order the server
/// returned them. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScreenResult {
    codes: Vec<String>,
}

impl ScreenResult {
    pub fn new(codes: Vec<String>) -> Self {
        Self { codes }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl From<Vec<String>> for ScreenResult {
    fn from(codes: Vec<String>) -> Self {
        Self::new(codes)
    }
}

impl IntoIterator for ScreenResult {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.codes.into_iter()
    }
}

impl<'a> IntoIterator for &'a ScreenResult {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.codes.iter()
    }
}

impl PartialEq<[&str]> for ScreenResult {
    fn eq(&self, other: &[&str]) -> bool {
        self.codes.len() == other.len() && self.codes.iter().zip(other).all(|(a, b)| a == b)
    }
}

impl<const N: usize> PartialEq<[&str; N]> for ScreenResult {
    fn eq(&self, other: &[&str; N]) -> bool {
        self == &other[..]
    }
}
