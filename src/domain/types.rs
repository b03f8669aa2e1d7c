//! Value types shared by query parameters, plans and persisted rows.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Identifier of one blog in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlogId(i64);

impl BlogId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Blog ids are assigned from 1 upwards; anything else never came out of the directory.
    pub const fn is_assigned(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for BlogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for BlogId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Deduplicated, ordered set of blog ids used by include/exclude filters.
///
/// Deserializes from either a single id or a list of ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "OneOrMany<i64>", into = "Vec<i64>")]
pub struct BlogIdSet(BTreeSet<BlogId>);

impl BlogIdSet {
    pub fn new(ids: impl IntoIterator<Item = impl Into<BlogId>>) -> Self {
        Self(ids.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, id: BlogId) -> bool {
        self.0.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = BlogId> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<i64> {
        self.iter().map(BlogId::get).collect()
    }
}

impl FromStr for BlogIdSet {
    type Err = DomainError;

    /// Parses `"2"`, `"2,3"` or `"2 3"`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let ids = split_list(value)
            .map(|raw| {
                raw.parse::<i64>()
                    .map_err(|err| DomainError::validation(format!("invalid blog id `{raw}`: {err}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(ids))
    }
}

impl From<OneOrMany<i64>> for BlogIdSet {
    fn from(value: OneOrMany<i64>) -> Self {
        match value {
            OneOrMany::One(id) => Self::new([id]),
            OneOrMany::Many(ids) => Self::new(ids),
        }
    }
}

impl From<BlogIdSet> for Vec<i64> {
    fn from(value: BlogIdSet) -> Self {
        value.to_vec()
    }
}

/// Record types matched by a query, in the order they were given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "OneOrMany<String>", into = "Vec<String>")]
pub struct PostTypes(Vec<String>);

impl PostTypes {
    /// Accepts `"post"`, `"post,page"` or `"post page"`; duplicates are dropped.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        Self::from_list(split_list(value).map(str::to_string))
    }

    pub fn from_list(types: impl IntoIterator<Item = String>) -> Result<Self, DomainError> {
        let mut unique: Vec<String> = Vec::new();
        for post_type in types {
            let trimmed = post_type.trim();
            if trimmed.is_empty() || unique.iter().any(|known| known == trimmed) {
                continue;
            }
            unique.push(trimmed.to_string());
        }

        if unique.is_empty() {
            return Err(DomainError::validation("post_type must name at least one type"));
        }

        Ok(Self(unique))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, post_type: &str) -> bool {
        self.0.iter().any(|known| known == post_type)
    }
}

impl Default for PostTypes {
    fn default() -> Self {
        Self(vec!["post".to_string()])
    }
}

impl TryFrom<OneOrMany<String>> for PostTypes {
    type Error = DomainError;

    fn try_from(value: OneOrMany<String>) -> Result<Self, Self::Error> {
        match value {
            OneOrMany::One(raw) => Self::parse(&raw),
            OneOrMany::Many(types) => Self::from_list(types),
        }
    }
}

impl From<PostTypes> for Vec<String> {
    fn from(value: PostTypes) -> Self {
        value.0
    }
}

/// Column the merged set is ordered by. Restricted to plain SQL identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderColumn(String);

impl OrderColumn {
    pub fn new(column: impl Into<String>) -> Result<Self, DomainError> {
        let column = column.into();
        if !is_sql_identifier(&column) {
            return Err(DomainError::validation(format!(
                "orderby `{column}` is not a plain column name"
            )));
        }
        Ok(Self(column))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OrderColumn {
    fn default() -> Self {
        Self("post_date".to_string())
    }
}

impl TryFrom<String> for OrderColumn {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OrderColumn> for String {
    fn from(value: OrderColumn) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            other => Err(DomainError::validation(format!(
                "order must be ASC or DESC, got `{other}`"
            ))),
        }
    }
}

impl TryFrom<String> for SortDirection {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SortDirection> for &'static str {
    fn from(value: SortDirection) -> Self {
        value.as_sql()
    }
}

/// Serde helper for options that accept a scalar or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

/// Letters, digits and underscores, not starting with a digit.
pub fn is_sql_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .trim()
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
}
