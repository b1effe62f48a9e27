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

//! Input buffers. [`InputBuffer`](struct.InputBuffer.html) is the immutable character source
//! users hand in; [`RecoveryBuffer`](struct.RecoveryBuffer.html) is the mutable overlay the
//! recovering runner splices repair markers into, while keeping a mapping back to the original
//! indices. Reads are total: out-of-range indices answer [`EOI`](../../pegrammar/constant.EOI.html).

use std::error::Error;
use std::fmt;
use std::ops::Range;

use pegrammar::{is_reserved_char, EOI};

// The recovery markers. Like EOI these are Unicode noncharacters: valid `char`s which never
// occur in text. They are part of the ABI: listeners observe them in buffers mid-recovery.

/// Marks the character after it as deleted.
pub const DEL_ERROR: char = '\u{FDEF}';
/// Marks the character after it as inserted.
pub const INS_ERROR: char = '\u{FDEE}';
/// A freshly placed resynchronisation point, not yet expanded into a range.
pub const RESYNC: char = '\u{FDED}';
/// The start of an expanded resynchronisation range.
pub const RESYNC_START: char = '\u{FDEC}';
/// The end of an expanded resynchronisation range.
pub const RESYNC_END: char = '\u{FDEB}';
/// A resynchronisation point at the end of input: there is nothing left to skip.
pub const RESYNC_EOI: char = '\u{FDEA}';

/// A buffer operation was asked to touch an index that holds no insertion.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BufferIndexError {
    pub idx: usize,
}

impl fmt::Display for BufferIndexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "no insertion at buffer index {}", self.idx)
    }
}

impl Error for BufferIndexError {}

/// An immutable, random-access character source.
#[derive(Clone, Debug)]
pub struct InputBuffer {
    chars: Vec<char>,
    line_starts: Vec<usize>,
}

impl InputBuffer {
    pub fn new(s: &str) -> Self {
        let chars = s.chars().collect::<Vec<_>>();
        let mut line_starts = vec![0];
        for (i, c) in chars.iter().enumerate() {
            if *c == '\n' {
                line_starts.push(i + 1);
            }
        }
        InputBuffer { chars, line_starts }
    }

    /// The character at index `i`, or `EOI` if `i` is out of range. Total: never fails.
    pub fn char_at(&self, i: usize) -> char {
        if i < self.chars.len() {
            self.chars[i]
        } else {
            EOI
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Do the characters starting at `i` equal `chars`?
    pub fn test(&self, i: usize, chars: &[char]) -> bool {
        chars
            .iter()
            .enumerate()
            .all(|(j, c)| self.char_at(i + j) == *c)
    }

    /// The text in `[start, end)`. Reserved code points are never part of user text and are
    /// filtered out; out-of-range portions of the span are ignored.
    pub fn extract(&self, start: usize, end: usize) -> String {
        (start..end)
            .map(|i| self.char_at(i))
            .filter(|c| !is_reserved_char(*c))
            .collect()
    }

    /// As [`extract`](#method.extract), from a range.
    pub fn extract_range(&self, r: Range<usize>) -> String {
        self.extract(r.start, r.end)
    }

    /// The (1-based) line and column of index `i`. Indices past the end report the position just
    /// after the last character.
    pub fn position(&self, i: usize) -> (usize, usize) {
        let i = if i > self.chars.len() {
            self.chars.len()
        } else {
            i
        };
        // the last line start <= i
        let line = match self.line_starts.binary_search(&i) {
            Ok(l) => l,
            Err(l) => l - 1,
        };
        (line + 1, i - self.line_starts[line] + 1)
    }

    /// The text of (1-based) line `n`, without its terminating newline. An out-of-range `n`
    /// answers the empty string.
    pub fn extract_line(&self, n: usize) -> String {
        if n == 0 || n > self.line_starts.len() {
            return String::new();
        }
        let start = self.line_starts[n - 1];
        let end = if n < self.line_starts.len() {
            self.line_starts[n] - 1
        } else {
            self.chars.len()
        };
        self.extract(start, end)
    }

    /// On a plain input buffer every index is an original index.
    pub fn original_index(&self, i: usize) -> usize {
        i
    }
}

/// A mutable overlay over an [`InputBuffer`](struct.InputBuffer.html): single characters can be
/// inserted at (and un-inserted from) arbitrary logical positions, shifting everything to their
/// right, while `original_index` projects logical indices back onto the untouched input.
#[derive(Debug)]
pub struct RecoveryBuffer {
    orig: InputBuffer,
    chars: Vec<char>,
    synthetic: Vec<bool>,
}

impl RecoveryBuffer {
    pub fn new(orig: InputBuffer) -> Self {
        let chars = orig.chars.clone();
        let synthetic = vec![false; chars.len()];
        RecoveryBuffer {
            orig,
            chars,
            synthetic,
        }
    }

    /// The untouched input this buffer overlays.
    pub fn original(&self) -> &InputBuffer {
        &self.orig
    }

    pub fn char_at(&self, i: usize) -> char {
        if i < self.chars.len() {
            self.chars[i]
        } else {
            EOI
        }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn test(&self, i: usize, chars: &[char]) -> bool {
        chars
            .iter()
            .enumerate()
            .all(|(j, c)| self.char_at(i + j) == *c)
    }

    pub fn extract(&self, start: usize, end: usize) -> String {
        (start..end)
            .map(|i| self.char_at(i))
            .filter(|c| !is_reserved_char(*c))
            .collect()
    }

    pub fn extract_range(&self, r: Range<usize>) -> String {
        self.extract(r.start, r.end)
    }

    pub fn position(&self, i: usize) -> (usize, usize) {
        self.orig.position(self.original_index(i))
    }

    pub fn extract_line(&self, n: usize) -> String {
        self.orig.extract_line(n)
    }

    /// Insert `c` at logical index `i`: afterwards `char_at(i) == c` and every position `>= i`
    /// has shifted up by one.
    pub fn insert(&mut self, i: usize, c: char) {
        self.chars.insert(i, c);
        self.synthetic.insert(i, true);
    }

    /// Remove the insertion at logical index `i`. It is an error if `i` does not hold an
    /// inserted character.
    pub fn undo_insert(&mut self, i: usize) -> Result<(), BufferIndexError> {
        if i >= self.chars.len() || !self.synthetic[i] {
            return Err(BufferIndexError { idx: i });
        }
        self.chars.remove(i);
        self.synthetic.remove(i);
        Ok(())
    }

    /// Rewrite the already-inserted character at logical index `i` in place. Original indices
    /// are unaffected.
    pub fn replace_inserted(&mut self, i: usize, c: char) -> Result<(), BufferIndexError> {
        if i >= self.chars.len() || !self.synthetic[i] {
            return Err(BufferIndexError { idx: i });
        }
        self.chars[i] = c;
        Ok(())
    }

    /// Project the logical index `i` back onto the original input: the largest original index
    /// `<= i` that was not produced by an insertion.
    pub fn original_index(&self, i: usize) -> usize {
        let mut k = i;
        if k >= self.chars.len() {
            return self.orig.len();
        }
        while self.synthetic[k] {
            if k == 0 {
                return 0;
            }
            k -= 1;
        }
        k - self.synthetic[..k].iter().filter(|&&b| b).count()
    }
}
