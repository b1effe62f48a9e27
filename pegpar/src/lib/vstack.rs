// Copyright (c) 2018 King's College London
// created by the Software Development Team <http://soft-dev.org/>
//
// The Universal Permissive License (UPL), Version 1.0
//
// Subject to the condition set forth below, permission is hereby granted to any person obtaining a
// copy of this software, associated documentation and/or data (collectively the "Software"), free
// of charge and under any and all copyright rights in the Software, and any and all patent rights
// owned or freely licensable by each licensor hereunder covering either (i) the unmodified
// Software as contributed to or provided by such licensor, or (ii) the Larger Works (as defined
// below), to deal in both
//
// (a) the Software, and
// (b) any piece of software and/or hardware listed in the lrgrwrks.txt file
// if one is included with the Software (each a "Larger Work" to which the Software is contributed
// by such licensors),
//
// without restriction, including without limitation the rights to copy, create derivative works
// of, display, perform, and distribute the Software and make, use, sell, offer for sale, import,
// export, have made, and have sold the Software and the Larger Work(s), and to sublicense the
// foregoing rights on either these or other terms.
//
// This license is subject to the following condition: The above copyright notice and either this
// complete permission notice or at a minimum a reference to the UPL must be included in all copies
// or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use cactus::Cactus;

/// The stack action matchers read and write. Backed by a parent-pointer tree, so the engine can
/// snapshot it at every matcher entry and restore it on failure in O(1), however deep the
/// speculation went.
#[derive(Clone, Debug)]
pub struct ValueStack<T> {
    c: Cactus<T>,
}

/// An O(1) copy of a [`ValueStack`](struct.ValueStack.html)'s state at some moment.
#[derive(Clone, Debug)]
pub struct StackSnapshot<T>(Cactus<T>);

impl<T: Clone> ValueStack<T> {
    pub fn new() -> Self {
        ValueStack { c: Cactus::new() }
    }

    pub fn push(&mut self, v: T) {
        self.c = self.c.child(v);
    }

    pub fn pop(&mut self) -> Option<T> {
        match self.c.val().cloned() {
            Some(v) => {
                // a cactus with a value always has a parent
                self.c = self.c.parent().unwrap();
                Some(v)
            }
            None => None,
        }
    }

    pub fn peek(&self) -> Option<&T> {
        self.c.val()
    }

    pub fn is_empty(&self) -> bool {
        self.c.val().is_none()
    }

    pub fn len(&self) -> usize {
        self.c.vals().count()
    }

    /// The stack's values, top first.
    pub fn to_vec(&self) -> Vec<T> {
        self.c.vals().cloned().collect()
    }

    pub fn snapshot(&self) -> StackSnapshot<T> {
        StackSnapshot(self.c.clone())
    }

    pub fn restore(&mut self, snap: StackSnapshot<T>) {
        self.c = snap.0;
    }
}

#[cfg(test)]
mod test {
    use super::ValueStack;

    #[test]
    fn test_push_pop() {
        let mut vs = ValueStack::new();
        assert!(vs.is_empty());
        vs.push(1);
        vs.push(2);
        assert_eq!(vs.len(), 2);
        assert_eq!(vs.peek(), Some(&2));
        assert_eq!(vs.pop(), Some(2));
        assert_eq!(vs.pop(), Some(1));
        assert_eq!(vs.pop(), None);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut vs = ValueStack::new();
        vs.push("a");
        let snap = vs.snapshot();
        vs.push("b");
        vs.push("c");
        assert_eq!(vs.len(), 3);
        vs.restore(snap);
        assert_eq!(vs.to_vec(), vec!["a"]);
    }
}
