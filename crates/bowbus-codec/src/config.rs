/// Limits applied when loading name tables from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameTableConfig {
    /// Maximum bytes allowed for a name table file.
    pub max_file_size: usize,
    /// Maximum characters kept per display name.
    pub max_name_len: usize,
}

impl Default for NameTableConfig {
    fn default() -> Self {
        Self {
            max_file_size: 256 * 1024,
            max_name_len: 64,
        }
    }
}
