use std::collections::HashSet;

/// Matches internal (slash separated) class names and resource paths against
/// a set of dotted package names.
#[derive(Debug, Clone, Default)]
pub struct PackagePatterns {
    names: HashSet<String>,
    prefixes: Vec<String>,
}

impl PackagePatterns {
    pub fn new<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names = HashSet::new();
        let mut prefixes = Vec::new();
        for package in packages {
            let internal_name = package.as_ref().trim().replace('.', "/");
            if internal_name.is_empty() {
                continue;
            }
            prefixes.push(format!("{internal_name}/"));
            names.insert(internal_name);
        }
        Self { names, prefixes }
    }

    /// True if `name` is one of the packages or lives underneath one of them.
    ///
    /// Prefix hits are remembered, so asking again for the same name is a
    /// single set lookup.
    pub fn matches(&mut self, name: &str) -> bool {
        if self.names.contains(name) {
            return true;
        }
        if self.prefixes.iter().any(|prefix| name.starts_with(prefix)) {
            self.names.insert(name.to_owned());
            return true;
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}
