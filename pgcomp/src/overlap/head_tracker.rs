/// Union-find over read indices tracking the first read of every chain.
///
/// Only chain heads are ever re-parented, so the parent pointers form a forest
/// even when the overlap graph itself is allowed to close a cycle.
#[derive(Debug, Clone)]
pub struct HeadTracker {
    parent: Vec<u32>,
}

impl HeadTracker {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len as u32).collect(),
        }
    }

    /// Returns the head of the chain containing `read`, compressing the path.
    pub fn get_head(&mut self, read: u32) -> u32 {
        let mut head = read;
        while self.parent[head as usize] != head {
            head = self.parent[head as usize];
        }

        let mut current = read;
        while current != head {
            let next = self.parent[current as usize];
            self.parent[current as usize] = head;
            current = next;
        }

        head
    }

    /// Appends the chain headed by `head` to a chain headed by `new_head`.
    pub fn attach(&mut self, head: u32, new_head: u32) {
        debug_assert_eq!(self.parent[head as usize], head, "attaching a non-head read");
        self.parent[head as usize] = new_head;
    }
}
