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

use std::error::Error;

use pegrammar::MIdx;

/// Synchronous observer of a parse. Listeners are called in the parse thread, during every run
/// the recovering runner performs, so mid-recovery buffers (markers included) are observable.
/// All hooks default to doing nothing.
///
/// An `Err` from a hook does not abort the current matcher: it is captured and re-raised as
/// [`RunError::Listener`](../parser/enum.RunError.html) at the next synchronous boundary, so the
/// failure is attributable to the phase it happened in. It is fatal to the parse.
pub trait ParseListener<StorageT> {
    /// A run is about to start.
    fn pre_parse(&mut self) -> Result<(), Box<Error>> {
        Ok(())
    }

    /// The engine is about to consult the matcher at `_midx`, at input index `_pos`.
    fn pre_match(&mut self, _midx: MIdx<StorageT>, _pos: usize) -> Result<(), Box<Error>> {
        Ok(())
    }

    /// The matcher at `_midx` matched `[_start, _end)`.
    fn match_success(
        &mut self,
        _midx: MIdx<StorageT>,
        _start: usize,
        _end: usize,
    ) -> Result<(), Box<Error>> {
        Ok(())
    }

    /// The matcher at `_midx` failed at input index `_pos`.
    fn match_failure(&mut self, _midx: MIdx<StorageT>, _pos: usize) -> Result<(), Box<Error>> {
        Ok(())
    }

    /// A run finished.
    fn post_parse(&mut self, _matched: bool) -> Result<(), Box<Error>> {
        Ok(())
    }
}
