/// Disjoint sets over pixel indices.
pub struct UnionFind {
    parent: Vec<u32>,
    size: Vec<u32>,
}

impl UnionFind {
    pub fn new(len: usize) -> Self {
        Self {
            parent: (0..len as u32).collect(),
            size: vec![1; len],
        }
    }

    /// Root of the set containing `id`, compressing the path on the way.
    pub fn find(&mut self, id: usize) -> usize {
        let mut root = id;
        while self.parent[root] as usize != root {
            root = self.parent[root] as usize;
        }
        let mut id = id;
        while self.parent[id] as usize != root {
            let next = self.parent[id] as usize;
            self.parent[id] = root as u32;
            id = next;
        }
        root
    }

    /// Merges the sets of `a` and `b` (union by size) and returns the new root.
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }
        let (big, small) = if self.size[ra] >= self.size[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small] = big as u32;
        self.size[big] += self.size[small];
        big
    }

    pub fn set_size(&mut self, id: usize) -> usize {
        let r = self.find(id);
        self.size[r] as usize
    }
}
