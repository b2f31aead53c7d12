//! HTTP header fields
//!
//! Header names are case-insensitive
//! ([RFC 7230 section 3](https://tools.ietf.org/html/rfc7230#section-3)), so
//! lookups return values regardless of the case of the name.
//!
//! Headers are kept in the order they were added. When a name is added more
//! than once, the later values are grouped with the earlier ones at the
//! position where the name first appeared.
use std::{collections::HashMap, fmt::Display, io::Write};

use crate::{error::ParseError, util::to_ascii_uppercase_cow};

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    name: String,
    values: Vec<String>,
}

impl Entry {
    fn new(name: &str) -> Self {
        Self {
            key: name.to_ascii_uppercase(),
            name: name.to_string(),
            values: Vec::with_capacity(3),
        }
    }
}

fn position(entries: &[Entry], name: &str) -> Option<usize> {
    let key = to_ascii_uppercase_cow(name);
    entries.iter().position(|entry| entry.key == key)
}

/// Immutable collection of HTTP headers.
///
/// Use [`HeaderTableBuilder`] to create or modify one.
///
/// No validation is performed on whether the names or values are valid HTTP
/// tokens.
#[derive(Debug, Clone, Default)]
pub struct HeaderTable {
    entries: Vec<Entry>,
}

impl HeaderTable {
    /// Returns a table without any header.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a builder starting with a copy of this table's headers.
    pub fn to_builder(&self) -> HeaderTableBuilder {
        HeaderTableBuilder::from(self)
    }

    /// Values for the header, or an empty slice if not present.
    pub fn get(&self, name: &str) -> &[String] {
        match position(&self.entries, name) {
            Some(index) => &self.entries[index].values,
            None => &[],
        }
    }

    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.get(name).first().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        position(&self.entries, name).is_some()
    }

    /// Items of a comma-separated list header, lower-cased and without
    /// duplicates.
    pub fn get_comma_list(&self, name: &str) -> Vec<String> {
        let mut list = Vec::new();

        for value in self.get(name) {
            for item in value.split(',') {
                let item = item.trim().to_ascii_lowercase();

                if !item.is_empty() && !list.contains(&item) {
                    list.push(item);
                }
            }
        }

        list
    }

    /// Names of all headers in the case they were inserted.
    ///
    /// A name appears once per value, so duplicates are expected.
    pub fn header_names(&self) -> Vec<&str> {
        self.iter().map(|(name, _value)| name).collect()
    }

    /// Distinct, upper-cased names in table order.
    pub fn unique_header_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    /// Number of name-value pairs.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|entry| entry.values.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Calls the function with every name-value pair in iteration order.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &str),
    {
        for (name, value) in self {
            f(name, value);
        }
    }

    pub fn iter(&self) -> HeaderTableIter<'_> {
        HeaderTableIter {
            entries: self.entries.iter(),
            current: None,
        }
    }

    /// Upper-cased names mapped to their values.
    pub fn to_map(&self) -> HashMap<String, Vec<String>> {
        self.entries
            .iter()
            .map(|entry| (entry.key.clone(), entry.values.clone()))
            .collect()
    }

    /// Writes the header lines and the terminating empty line.
    pub fn write_to<W: Write>(&self, mut buf: W) -> std::io::Result<()> {
        for (name, value) in self {
            buf.write_all(name.as_bytes())?;
            buf.write_all(b": ")?;
            buf.write_all(value.as_bytes())?;
            buf.write_all(b"\r\n")?;
        }

        buf.write_all(b"\r\n")?;

        Ok(())
    }

    /// Parses header lines such as the ones produced by [`Self::write_to`].
    ///
    /// The terminating empty line is optional. Obsolete line folding is
    /// replaced with a single space. Whitespace around a value is dropped.
    pub fn parse(input: &[u8]) -> Result<Self, ParseError> {
        let pairs = crate::parse::parse_name_value_fields(input)?;
        let mut builder = HeaderTableBuilder::new();

        for pair in pairs {
            let name = std::str::from_utf8(pair.name)?;
            let value = crate::parse::remove_line_folding(pair.value);
            let value = std::str::from_utf8(&value)?;

            builder.with(name, value.trim_end_matches([' ', '\t']));
        }

        Ok(builder.build())
    }
}

impl PartialEq for HeaderTable {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().all(|entry| {
                other
                    .entries
                    .iter()
                    .find(|other_entry| other_entry.key == entry.key)
                    .is_some_and(|other_entry| other_entry.values == entry.values)
            })
    }
}

impl Eq for HeaderTable {}

impl Display for HeaderTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (name, value) in self {
            write!(f, "{}: {}\r\n", name, value)?;
        }

        f.write_str("\r\n")
    }
}

impl<'a> IntoIterator for &'a HeaderTable {
    type Item = (&'a str, &'a str);
    type IntoIter = HeaderTableIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<N: AsRef<str>, V: Into<String>> FromIterator<(N, V)> for HeaderTable {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut builder = HeaderTableBuilder::new();

        for (name, value) in iter {
            builder.with(name.as_ref(), value);
        }

        builder.build()
    }
}

/// Iterator over the name-value pairs of a [`HeaderTable`].
///
/// The name is the original name of the header.
#[derive(Debug)]
pub struct HeaderTableIter<'a> {
    entries: std::slice::Iter<'a, Entry>,
    current: Option<(&'a str, std::slice::Iter<'a, String>)>,
}

impl<'a> Iterator for HeaderTableIter<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((name, values)) = &mut self.current {
                if let Some(value) = values.next() {
                    return Some((*name, value.as_str()));
                }
            }

            let entry = self.entries.next()?;
            self.current = Some((entry.name.as_str(), entry.values.iter()));
        }
    }
}

/// Mutable builder of [`HeaderTable`].
#[derive(Debug, Clone, Default)]
pub struct HeaderTableBuilder {
    entries: Vec<Entry>,
}

impl HeaderTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value to the header.
    ///
    /// A new name keeps the casing given here and is placed after all
    /// existing headers.
    pub fn with<V: Into<String>>(&mut self, name: &str, value: V) -> &mut Self {
        let index = match position(&self.entries, name) {
            Some(index) => index,
            None => {
                self.entries.push(Entry::new(name));
                self.entries.len() - 1
            }
        };

        self.entries[index].values.push(value.into());
        self
    }

    /// Replaces all values of the header with the single value.
    pub fn overwrite<V: Into<String>>(&mut self, name: &str, value: V) -> &mut Self {
        let mut entry = Entry::new(name);
        entry.values.push(value.into());

        match position(&self.entries, name) {
            Some(index) => self.entries[index] = entry,
            None => self.entries.push(entry),
        }

        self
    }

    /// Removes the header including all of its values.
    pub fn remove(&mut self, name: &str) -> &mut Self {
        if let Some(index) = position(&self.entries, name) {
            self.entries.remove(index);
        }

        self
    }

    /// Adds every name-value pair of the given headers.
    pub fn merge(&mut self, headers: &HeaderTable) -> &mut Self {
        for (name, value) in headers {
            self.with(name, value);
        }

        self
    }

    /// Names of the headers added so far, once per header.
    pub fn header_names(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.name.as_str()).collect()
    }

    pub fn build(&self) -> HeaderTable {
        HeaderTable {
            entries: self.entries.clone(),
        }
    }
}

impl From<&HeaderTable> for HeaderTableBuilder {
    fn from(value: &HeaderTable) -> Self {
        Self {
            entries: value.entries.clone(),
        }
    }
}
