//! Folder hierarchy built from flat records.
//!
//! Each node owns its child folders and borrows the records filed directly in
//! it. Children keep the order in which their folder was first seen.

use favs_shared::BookmarkRecord;

/// One folder and everything below it. The root has an empty name.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FolderNode<'a> {
    pub name: &'a str,
    pub bookmarks: Vec<&'a BookmarkRecord>,
    pub children: Vec<FolderNode<'a>>,
}

impl<'a> FolderNode<'a> {
    /// Build the tree for `records`.
    pub fn build<I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a BookmarkRecord>,
    {
        let mut root = FolderNode::default();
        for record in records {
            let mut node = &mut root;
            for name in &record.folder_path {
                node = node.child_mut(name);
            }
            node.bookmarks.push(record);
        }
        root
    }

    fn child_mut(&mut self, name: &'a str) -> &mut FolderNode<'a> {
        let idx = match self.children.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                self.children.push(FolderNode {
                    name,
                    ..Default::default()
                });
                self.children.len() - 1
            }
        };
        &mut self.children[idx]
    }

    /// Sort bookmarks by title and folders by name, case-insensitively, at
    /// every level.
    pub fn sort_alphabetically(&mut self) {
        self.bookmarks
            .sort_by_cached_key(|b| b.display_title().to_lowercase());
        self.children.sort_by_cached_key(|c| c.name.to_lowercase());
        for child in &mut self.children {
            child.sort_alphabetically();
        }
    }

    /// Number of records in this node and all descendants.
    pub fn total(&self) -> usize {
        self.bookmarks.len() + self.children.iter().map(FolderNode::total).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(title: &str, folders: &[&str]) -> BookmarkRecord {
        BookmarkRecord {
            folder_path: folders.iter().map(|f| f.to_string()).collect(),
            ..BookmarkRecord::new(title, format!("https://{title}.example"))
        }
    }

    #[test]
    fn children_keep_first_seen_order() {
        let records = vec![
            rec("a", &["Zed", "Inner"]),
            rec("b", &["Alpha"]),
            rec("c", &[]),
            rec("d", &["Zed"]),
        ];
        let tree = FolderNode::build(&records);

        assert_eq!(tree.name, "");
        assert_eq!(tree.bookmarks.len(), 1);
        let names: Vec<&str> = tree.children.iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Zed", "Alpha"]);
        assert_eq!(tree.children[0].bookmarks[0].title, "d");
        assert_eq!(tree.children[0].children[0].name, "Inner");
        assert_eq!(tree.total(), 4);
    }

    #[test]
    fn sorting_is_recursive_and_case_insensitive() {
        let records = vec![
            rec("beta", &["b"]),
            rec("Alpha", &["b"]),
            rec("x", &["A"]),
        ];
        let mut tree = FolderNode::build(&records);
        tree.sort_alphabetically();

        assert_eq!(tree.children[0].name, "A");
        let titles: Vec<&str> = tree.children[1]
            .bookmarks
            .iter()
            .map(|b| b.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Alpha", "beta"]);
    }
}
