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

//! A library for building and analysing Parsing Expression Grammars (PEGs) at the matcher level.
//! A PEG, for our purposes, is an arena of *matchers*: a matcher is a node such as a sequence, an
//! ordered choice, a repetition, a predicate, or a single-character terminal. Matchers reference
//! their children by index into the arena, which makes recursive rules unremarkable: a rule that
//! (transitively) contains itself is simply an index cycle.
//!
//! Terminology is kept deliberately small:
//!
//!   * A *grammar* is an arena of matchers plus a distinguished root matcher.
//!   * A *matcher* is one node of the grammar; its children are matcher indices.
//!   * An *action* is a matcher that runs user code against a value stack at parse time. The
//!     grammar only records that an action slot exists; the code itself is supplied to the
//!     runtime separately, in slot order.
//!
//! pegrammar makes the following guarantees about grammars:
//!
//!   * Matchers are numbered from `0` to `matchers_len() - 1` (inclusive).
//!   * Action slots are numbered from `0` to `actions_len() - 1` (inclusive) in creation order.
//!   * The StorageT type used to store matcher and action indices can be infallibly converted
//!     into usize (see [`MIdx`](struct.MIdx.html) and friends for more details).
//!
//! The matcher-level analyses a recovering runtime needs (nullability, starter characters,
//! resynchronisation action collection) live in [`peg::visit`](peg/visit/index.html); none of
//! them requires extending the matcher types.

extern crate fnv;
extern crate num_traits;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;
extern crate vob;

mod idxnewtype;
pub mod peg;

pub use idxnewtype::{AIdx, MIdx};

/// The character pseudo-returned by input buffers for out-of-range indices, and matched by the
/// end-of-input matcher. A Unicode noncharacter: it is a valid `char` but never occurs in text.
pub const EOI: char = '\u{FFFF}';

/// Is `c` one of the code points this crate family reserves for itself? Covers [`EOI`](constant.EOI.html)
/// and the block `U+FDEA ..= U+FDEF` used by the recovery markers. Grammars may not match reserved
/// characters literally and input is assumed never to contain them.
pub fn is_reserved_char(c: char) -> bool {
    c == EOI || ('\u{FDEA}' <= c && c <= '\u{FDEF}')
}
