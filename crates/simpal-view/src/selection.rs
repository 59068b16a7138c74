use std::collections::BTreeSet;

/// How a click on a line changes the selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectMode {
    /// Plain click: select only this line.
    Replace,
    /// Shift-click: add every line between the anchor and this one.
    Extend,
    /// Ctrl/Cmd-click: flip this line.
    Toggle,
}

/// A set of selected line indices plus the anchor for range extension.
///
/// The anchor starts at the first line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    items: BTreeSet<usize>,
    anchor: usize,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a click on `index`.
    ///
    /// `Extend` leaves the anchor where it was, so repeated shift-clicks all
    /// grow from the same line.
    pub fn apply(&mut self, index: usize, mode: SelectMode) {
        match mode {
            SelectMode::Extend => {
                let (start, end) = (self.anchor.min(index), self.anchor.max(index));
                self.items.extend(start..=end);
            }
            SelectMode::Toggle => {
                if !self.items.remove(&index) {
                    self.items.insert(index);
                    self.anchor = index;
                }
            }
            SelectMode::Replace => {
                self.items.clear();
                self.items.insert(index);
                self.anchor = index;
            }
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.items.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn anchor(&self) -> usize {
        self.anchor
    }

    /// Selected indices in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.items.iter().copied()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.anchor = 0;
    }
}
