use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub size: u64,
    // mtime in ms since the epoch
    pub modified: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub name: String,
    pub modified: i64,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    File(FileNode),
    Directory(DirectoryNode),
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::File(f) => &f.name,
            TreeNode::Directory(d) => &d.name,
        }
    }

    pub fn count(&self) -> usize {
        match self {
            TreeNode::File(_) => 1,
            TreeNode::Directory(d) => 1 + d.children.iter().map(TreeNode::count).sum::<usize>(),
        }
    }

    pub fn flatten_into(&self, prefix: &str, out: &mut Vec<String>) {
        let path = if prefix.ends_with('/') {
            format!("{prefix}{}", self.name())
        } else {
            format!("{prefix}/{}", self.name())
        };
        if let TreeNode::Directory(d) = self {
            out.push(path.clone());
            for child in &d.children {
                child.flatten_into(&path, out);
            }
        } else {
            out.push(path);
        }
    }
}
