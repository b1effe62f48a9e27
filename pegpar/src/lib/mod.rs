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

//! A recursive-descent runtime for [pegrammar](../pegrammar/index.html) grammars whose parse
//! runner recovers from errors rather than stopping at the first one. The runner repairs
//! malformed input by speculatively splicing marker characters into a mutable copy of the input
//! (single-character deletion, insertion, and replacement, with panic-mode resynchronisation as
//! the fallback) and re-running the matcher engine until every error has been located, classified,
//! and recorded. The engine itself knows nothing about recovery: it consults a match handler at
//! every matcher entry, and the recovering handler is where all marker interpretation lives.
//!
//! The entry point is [`RecoveringParser`](recovery/struct.RecoveringParser.html); on completion
//! its [`ParseResult`](parser/struct.ParseResult.html) always has `matched == true`, with one
//! [`ParseError`](parser/struct.ParseError.html) recorded per repaired position.

extern crate cactus;
extern crate indexmap;
extern crate num_traits;
extern crate pegrammar;
#[macro_use]
extern crate serde;
extern crate vob;

pub mod buffer;
pub mod events;
pub mod parser;
pub mod recovery;
mod vstack;

pub use buffer::{InputBuffer, RecoveryBuffer};
pub use events::ParseListener;
pub use parser::{
    ActionCtx, ActionFn, MatcherPath, Node, ParseError, ParseResult, PathElement, RunError,
};
pub use recovery::RecoveringParser;
pub use vstack::{StackSnapshot, ValueStack};
