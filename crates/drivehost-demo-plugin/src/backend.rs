//! In-memory folder tree served by the demo driver.

use std::collections::BTreeMap;

use drivehost_plugins::model::Object;

/// Fixed tree of folders and files.
#[derive(Debug, Clone, Default)]
pub struct DemoTree {
    folders: BTreeMap<String, Vec<Object>>,
}

impl DemoTree {
    /// The tree served by the demo plugin.
    ///
    /// ```text
    /// /
    /// ├── docs/
    /// │   ├── guide.md
    /// │   └── readme.txt
    /// ├── empty/
    /// └── hello.txt
    /// ```
    #[must_use]
    pub fn sample() -> Self {
        let mut tree = Self::default();
        tree.add_folder("/", "docs");
        tree.add_folder("/", "empty");
        tree.add_file("/", "hello.txt", 13);
        tree.add_file("/docs", "guide.md", 2048);
        tree.add_file("/docs", "readme.txt", 12);
        tree
    }

    fn add_folder(&mut self, parent: &str, name: &str) {
        let path = join(parent, name);
        self.folders.entry(path.clone()).or_default();
        self.insert(parent, Object {
            id: path.clone(),
            path,
            name: name.to_owned(),
            is_folder: true,
            ..Object::default()
        });
    }

    fn add_file(&mut self, parent: &str, name: &str, size: i64) {
        let path = join(parent, name);
        self.insert(parent, Object {
            id: path.clone(),
            path,
            name: name.to_owned(),
            size,
            modified: 1_700_000_000,
            is_folder: false,
        });
    }

    fn insert(&mut self, parent: &str, object: Object) {
        let children = self.folders.entry(normalise(parent)).or_default();
        children.push(object);
        children.sort_by(|left, right| left.name.cmp(&right.name));
    }

    /// Children of the folder at `path`, or `None` if no such folder exists.
    #[must_use]
    pub fn children(&self, path: &str) -> Option<&[Object]> {
        self.folders.get(&normalise(path)).map(Vec::as_slice)
    }

    /// The object at `path`.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Object> {
        let wanted = normalise(path);
        self.folders
            .values()
            .flatten()
            .find(|object| object.path == wanted)
    }
}

/// Collapses trailing slashes; the empty path is the root.
fn normalise(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        String::from("/")
    } else if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

fn join(parent: &str, name: &str) -> String {
    let base = normalise(parent);
    if base == "/" {
        format!("/{name}")
    } else {
        format!("{base}/{name}")
    }
}
