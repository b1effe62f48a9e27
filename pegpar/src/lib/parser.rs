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

//! The matcher engine. A single invariant governs everything here: a matcher succeeds iff it
//! matched at its entry index, leaving the cursor at the first unconsumed position; on failure
//! the cursor and the value stack are exactly as they were at entry. The engine consults a
//! [`MatchHandler`](enum.MatchHandler.html) at every matcher entry rather than running matchers
//! directly; that single seam is where error recovery (see the
//! [`recovery`](../recovery/index.html) module) splices itself in, and the engine itself stays
//! oblivious to it.

use std::error::Error;
use std::fmt;
use std::hash::Hash;
use std::time::Instant;

use indexmap::IndexSet;
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use pegrammar::peg::{visit, InvalidGrammarError, MatcherKind, PegGrammar};
use pegrammar::{is_reserved_char, AIdx, MIdx, EOI};

use buffer::RecoveryBuffer;
use events::ParseListener;
use vstack::ValueStack;

/// One step of a root-to-leaf path through the grammar: which matcher was entered, and at which
/// input index.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct PathElement<StorageT> {
    pub midx: MIdx<StorageT>,
    pub start: usize,
}

/// The path from the root matcher down to the matcher that failed: this is how an error report
/// identifies *which* grammar position gave up, not merely where in the input.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct MatcherPath<StorageT> {
    pub elems: Vec<PathElement<StorageT>>,
}

impl<StorageT: 'static + PrimInt + Unsigned> MatcherPath<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// The deepest element of the path, if any.
    pub fn leaf(&self) -> Option<&PathElement<StorageT>> {
        self.elems.last()
    }

    /// Render the path readably, preferring labels over raw matcher indices.
    pub fn pp(&self, grm: &PegGrammar<StorageT>) -> String {
        self.elems
            .iter()
            .map(|e| match grm.label(e.midx) {
                Some(l) => l.to_owned(),
                None => format!("{}", usize::from(e.midx)),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// A parse tree node. Terminals and labelled matchers produce nodes; anonymous combinators
/// splice their children into their parent's node.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Node<StorageT> {
    pub midx: MIdx<StorageT>,
    pub start: usize,
    pub end: usize,
    /// Did error recovery intervene inside this node's span?
    pub error: bool,
    pub children: Vec<Node<StorageT>>,
}

impl<StorageT: 'static + fmt::Debug + PrimInt + Unsigned> Node<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Pretty-print the tree, one node per line, children indented under parents. Terminal
    /// nodes also print the text they matched.
    pub fn pp(&self, grm: &PegGrammar<StorageT>, buf: &RecoveryBuffer) -> String {
        let mut s = String::new();
        self.pp_into(grm, buf, 0, &mut s);
        s
    }

    fn pp_into(
        &self,
        grm: &PegGrammar<StorageT>,
        buf: &RecoveryBuffer,
        indent: usize,
        s: &mut String,
    ) {
        for _ in 0..indent {
            s.push(' ');
        }
        match grm.label(self.midx) {
            Some(l) => s.push_str(l),
            None => s.push_str(&format!("{:?}", grm.matcher(self.midx))),
        }
        if self.children.is_empty() && self.end > self.start {
            s.push(' ');
            s.push_str(&buf.extract(self.start, self.end));
        }
        s.push('\n');
        for c in &self.children {
            c.pp_into(grm, buf, indent + 1, s);
        }
    }
}

/// A recoverable invalid-input error at a specific (possibly repaired) position. The position is
/// held as the index observed when the error was reported plus a delta that the runner bumps as
/// later repairs shift logical indices, so that `start_index` is always valid in the final
/// buffer's coordinates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParseError<StorageT> {
    start: usize,
    index_delta: i64,
    end: Option<usize>,
    failed: Vec<MatcherPath<StorageT>>,
}

impl<StorageT> ParseError<StorageT> {
    pub(crate) fn new(start: usize, failed: Vec<MatcherPath<StorageT>>) -> Self {
        ParseError {
            start,
            index_delta: 0,
            end: None,
            failed,
        }
    }

    /// Where the error starts, in the coordinates of the buffer attached to the parse result.
    pub fn start_index(&self) -> usize {
        debug_assert!(self.start as i64 + self.index_delta >= 0);
        (self.start as i64 + self.index_delta) as usize
    }

    /// Where the error ends. Equal to `start_index` for a point error; greater for the range
    /// errors produced by resynchronisation.
    pub fn end_index(&self) -> usize {
        match self.end {
            Some(e) => e,
            None => self.start_index(),
        }
    }

    /// Is this a range error (produced by resynchronisation)?
    pub fn is_range(&self) -> bool {
        self.end.is_some()
    }

    /// The matcher paths which were tried, and failed, at `start_index`.
    pub fn failed_matchers(&self) -> &[MatcherPath<StorageT>] {
        &self.failed
    }

    /// Shift the reported start index by `n`: called by the runner whenever an edit inserts
    /// characters at or before this error's position.
    pub fn shift_index_delta_by(&mut self, n: i64) {
        self.index_delta += n;
    }

    pub(crate) fn set_end(&mut self, end: usize) {
        self.end = Some(end);
    }
}

impl<StorageT> fmt::Display for ParseError<StorageT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_range() {
            write!(
                f,
                "invalid input between indices {} and {}",
                self.start_index(),
                self.end_index()
            )
        } else {
            write!(f, "invalid input at index {}", self.start_index())
        }
    }
}

impl<StorageT: fmt::Debug> Error for ParseError<StorageT> {}

/// What a parse hands back: under the recovering runner `matched` is always true and every
/// repaired position is listed in `errors`, ordered by start index.
#[derive(Debug)]
pub struct ParseResult<StorageT, ActionT> {
    pub matched: bool,
    pub tree: Option<Node<StorageT>>,
    pub vstack: ValueStack<ActionT>,
    pub errors: Vec<ParseError<StorageT>>,
    /// The buffer the indices in `errors` (and `tree`) refer to, including any repair markers.
    pub buffer: RecoveryBuffer,
}

/// The fatal (non-recoverable) ways a parse can end.
#[derive(Debug)]
pub enum RunError<StorageT, ActionT> {
    /// The wall-clock budget was exhausted. Carries the last known state of the parse.
    Timeout {
        partial: Box<ParseResult<StorageT, ActionT>>,
    },
    /// An engine or buffer invariant was broken: this signals a bug, not bad input.
    InvariantViolation(String),
    /// A grammar defect surfaced during matcher visitation.
    InvalidGrammar(InvalidGrammarError),
    /// A listener returned an error; re-raised at the next synchronous boundary.
    Listener(Box<Error>),
}

impl<StorageT, ActionT> fmt::Display for RunError<StorageT, ActionT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RunError::Timeout { .. } => write!(f, "parse timed out"),
            RunError::InvariantViolation(ref s) => write!(f, "invariant violation: {}", s),
            RunError::InvalidGrammar(ref e) => write!(f, "invalid grammar: {}", e),
            RunError::Listener(ref e) => write!(f, "listener error: {}", e),
        }
    }
}

impl<StorageT: fmt::Debug, ActionT: fmt::Debug> Error for RunError<StorageT, ActionT> {}

/// What an action sees when it runs: the value stack it may rewrite, the buffer, the span of the
/// most recent successful match, and whether the action is being replayed as part of error
/// recovery (in which case its return value is ignored).
pub struct ActionCtx<'a, ActionT: 'a> {
    pub vstack: &'a mut ValueStack<ActionT>,
    pub buffer: &'a RecoveryBuffer,
    pub matched_span: (usize, usize),
    pub in_recovery: bool,
}

impl<'a, ActionT: Clone> ActionCtx<'a, ActionT> {
    /// The text of the most recent successful match (repair markers excluded).
    pub fn matched_text(&self) -> String {
        self.buffer.extract(self.matched_span.0, self.matched_span.1)
    }
}

/// The code run by an `Action` matcher. Returning false fails the matcher.
pub type ActionFn<ActionT> = Box<Fn(&mut ActionCtx<ActionT>) -> bool>;

/// One activation record on the engine's ancestor chain: the matcher, the index it was entered
/// at, which of its children is currently active, and whether recovery marked it as an error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Frame<StorageT> {
    pub(crate) midx: MIdx<StorageT>,
    pub(crate) start: usize,
    pub(crate) child: usize,
    pub(crate) error: bool,
}

/// The recovery handler's per-run state.
pub(crate) struct RecoverState<StorageT> {
    /// The furthest position reached by a successful single-character match.
    pub(crate) fringe: usize,
    /// The ancestor chain of the match that set `fringe`.
    pub(crate) last_match_frames: Option<Vec<Frame<StorageT>>>,
    /// Set when a fresh `RESYNC` marker was expanded into a range during this run.
    pub(crate) resync_end: Option<usize>,
    /// The rightmost index at which a (non-predicate) match attempt failed.
    pub(crate) furthest_fail: Option<usize>,
}

impl<StorageT> RecoverState<StorageT> {
    pub(crate) fn new() -> Self {
        RecoverState {
            fringe: 0,
            last_match_frames: None,
            resync_end: None,
            furthest_fail: None,
        }
    }

    pub(crate) fn note_fail(&mut self, pos: usize) {
        match self.furthest_fail {
            Some(f) if f >= pos => (),
            _ => self.furthest_fail = Some(pos),
        }
    }
}

/// The error-reporting handler: recovery-aware matching plus, at the known error index, a
/// duplicate-free record of every matcher path that was tried and failed there.
pub(crate) struct ReportState<StorageT: Hash + Eq> {
    pub(crate) rec: RecoverState<StorageT>,
    pub(crate) at: usize,
    pub(crate) failed: IndexSet<MatcherPath<StorageT>>,
}

/// What the engine consults at every matcher entry.
pub(crate) enum MatchHandler<StorageT: Hash + Eq> {
    /// Forward straight to the matcher (basic runs).
    Passthrough,
    /// Interpret repair markers and track the fringe (locating and final runs).
    Recover(RecoverState<StorageT>),
    /// As `Recover`, plus failed-path recording at a fixed index (reporting runs).
    Report(ReportState<StorageT>),
}

impl<StorageT: Hash + Eq> MatchHandler<StorageT> {
    /// The recovery state shared by the `Recover` and `Report` variants.
    ///
    /// # Panics
    ///
    /// If called on `Passthrough`.
    pub(crate) fn rec_mut(&mut self) -> &mut RecoverState<StorageT> {
        match *self {
            MatchHandler::Recover(ref mut r) => r,
            MatchHandler::Report(ref mut rp) => &mut rp.rec,
            MatchHandler::Passthrough => unreachable!(),
        }
    }

    pub(crate) fn rec(&self) -> &RecoverState<StorageT> {
        match *self {
            MatchHandler::Recover(ref r) => r,
            MatchHandler::Report(ref rp) => &rp.rec,
            MatchHandler::Passthrough => unreachable!(),
        }
    }
}

/// The fatal outcomes the engine can signal mid-run; converted into
/// [`RunError`](enum.RunError.html)s (with the partial result attached where relevant) by the
/// runner.
pub(crate) enum Fatal {
    Timeout,
    Invariant(String),
    Grammar(InvalidGrammarError),
    Listener(Box<Error>),
}

/// `Ok(Some(end))`: matched, cursor now at `end`. `Ok(None)`: failed, state restored.
pub(crate) type MRes = Result<Option<usize>, Fatal>;

/// All the state of one run: one grammar, one buffer, one value stack, one ancestor chain.
pub(crate) struct RunState<'a, StorageT: 'a + Hash + Eq, ActionT: 'a> {
    pub(crate) grm: &'a PegGrammar<StorageT>,
    pub(crate) actions: &'a [ActionFn<ActionT>],
    pub(crate) buf: &'a mut RecoveryBuffer,
    pub(crate) vstack: ValueStack<ActionT>,
    pub(crate) listeners: &'a mut Vec<Box<ParseListener<StorageT>>>,
    pub(crate) listener_err: Option<Box<Error>>,
    pub(crate) finish_by: Option<Instant>,
    pub(crate) build_tree: bool,
    /// Depth of `Test`/`TestNot` nesting: while positive, failures are expected and are not
    /// recorded, and no tree nodes are built.
    pub(crate) predicates: usize,
    pub(crate) frames: Vec<Frame<StorageT>>,
    pub(crate) nodes: Vec<Node<StorageT>>,
    /// Where the most recent failing sequence got to before its child failed.
    pub(crate) seq_fail: usize,
    pub(crate) last_span: (usize, usize),
}

pub(crate) struct RunOutcome<StorageT, ActionT> {
    pub(crate) matched: bool,
    pub(crate) tree: Option<Node<StorageT>>,
    pub(crate) vstack: ValueStack<ActionT>,
}

/// Build a run state over `buf` and drive the root matcher once.
pub(crate) fn run_once<StorageT: 'static + fmt::Debug + Hash + PrimInt + Unsigned, ActionT: Clone>(
    grm: &PegGrammar<StorageT>,
    actions: &[ActionFn<ActionT>],
    buf: &mut RecoveryBuffer,
    listeners: &mut Vec<Box<ParseListener<StorageT>>>,
    h: &mut MatchHandler<StorageT>,
    build_tree: bool,
    finish_by: Option<Instant>,
) -> Result<RunOutcome<StorageT, ActionT>, Fatal>
where
    usize: AsPrimitive<StorageT>,
{
    let mut st = RunState {
        grm,
        actions,
        buf,
        vstack: ValueStack::new(),
        listeners,
        listener_err: None,
        finish_by,
        build_tree,
        predicates: 0,
        frames: Vec::new(),
        nodes: Vec::new(),
        seq_fail: 0,
        last_span: (0, 0),
    };
    st.notify_pre_parse();
    let root = grm.root();
    let matched = match st.execute(h, root, 0)? {
        Some(_) => true,
        None => false,
    };
    // post-match is a synchronous boundary: surface any captured listener error here
    if let Some(e) = st.listener_err.take() {
        return Err(Fatal::Listener(e));
    }
    st.notify_post_parse(matched);
    if let Some(e) = st.listener_err.take() {
        return Err(Fatal::Listener(e));
    }
    let tree = if matched && build_tree {
        st.nodes.pop()
    } else {
        None
    };
    Ok(RunOutcome {
        matched,
        tree,
        vstack: st.vstack,
    })
}

impl<'a, StorageT: 'static + fmt::Debug + Hash + PrimInt + Unsigned, ActionT: Clone>
    RunState<'a, StorageT, ActionT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Enter the matcher at `midx` at input index `pos`, consulting the handler. All per-entry
    /// bookkeeping (frames, listeners, state restoration on failure, tree nodes, locating and
    /// reporting records) happens here, so the matcher implementations in `execute_real` and the
    /// recovery handler stay small.
    pub(crate) fn execute(
        &mut self,
        h: &mut MatchHandler<StorageT>,
        midx: MIdx<StorageT>,
        pos: usize,
    ) -> MRes {
        self.frames.push(Frame {
            midx,
            start: pos,
            child: 0,
            error: false,
        });
        self.notify_pre_match(midx, pos);
        let nodes_mark = self.nodes.len();
        let vsnap = self.vstack.snapshot();
        match self.dispatch(h, midx, pos) {
            Ok(Some(end)) => {
                self.notify_match_success(midx, pos, end);
                if end > pos && self.predicates == 0 {
                    self.last_span = (pos, end);
                }
                let frame = self.frames.pop().unwrap();
                if self.build_tree && self.predicates == 0 {
                    if self.is_terminal(midx) {
                        if end > pos {
                            self.nodes.push(Node {
                                midx,
                                start: pos,
                                end,
                                error: frame.error,
                                children: vec![],
                            });
                        }
                    } else if self.grm.label(midx).is_some() || midx == self.grm.root() {
                        let children = self.nodes.split_off(nodes_mark);
                        self.nodes.push(Node {
                            midx,
                            start: pos,
                            end,
                            error: frame.error,
                            children,
                        });
                    } else if frame.error {
                        // anonymous combinator: don't lose the error mark
                        if let Some(f) = self.frames.last_mut() {
                            f.error = true;
                        }
                    }
                } else if frame.error {
                    if let Some(f) = self.frames.last_mut() {
                        f.error = true;
                    }
                }
                Ok(Some(end))
            }
            Ok(None) => {
                self.vstack.restore(vsnap);
                self.nodes.truncate(nodes_mark);
                if self.predicates == 0 {
                    match *h {
                        MatchHandler::Recover(ref mut rec) => rec.note_fail(pos),
                        MatchHandler::Report(ref mut rp) => {
                            rp.rec.note_fail(pos);
                            if pos == rp.at && self.reportable_leaf(midx) {
                                let path = MatcherPath {
                                    elems: self
                                        .frames
                                        .iter()
                                        .map(|f| PathElement {
                                            midx: f.midx,
                                            start: f.start,
                                        })
                                        .collect(),
                                };
                                rp.failed.insert(path);
                            }
                        }
                        MatchHandler::Passthrough => (),
                    }
                }
                self.notify_match_failure(midx, pos);
                self.frames.pop();
                // the timeout is checked on every sequence failure
                if let MatcherKind::Seq(_) = *self.grm.matcher(midx) {
                    if let Some(fb) = self.finish_by {
                        if Instant::now() >= fb {
                            return Err(Fatal::Timeout);
                        }
                    }
                }
                Ok(None)
            }
            Err(f) => {
                self.frames.pop();
                Err(f)
            }
        }
    }

    pub(crate) fn dispatch(
        &mut self,
        h: &mut MatchHandler<StorageT>,
        midx: MIdx<StorageT>,
        pos: usize,
    ) -> MRes {
        match *h {
            MatchHandler::Passthrough => self.execute_real(h, midx, pos),
            MatchHandler::Recover(_) | MatchHandler::Report(_) => {
                self.recover_handle(h, midx, pos)
            }
        }
    }

    /// The matcher semantics themselves, with no recovery logic whatsoever.
    pub(crate) fn execute_real(
        &mut self,
        h: &mut MatchHandler<StorageT>,
        midx: MIdx<StorageT>,
        pos: usize,
    ) -> MRes {
        let grm = self.grm;
        match *grm.matcher(midx) {
            MatcherKind::Seq(ref children) => {
                let mut cur = pos;
                for (i, &c) in children.iter().enumerate() {
                    let fidx = self.frames.len() - 1;
                    self.frames[fidx].child = i;
                    match self.execute(h, c, cur)? {
                        Some(new) => cur = new,
                        None => {
                            self.seq_fail = cur;
                            return Ok(None);
                        }
                    }
                }
                Ok(Some(cur))
            }
            MatcherKind::FirstOf(ref children) => {
                for (i, &c) in children.iter().enumerate() {
                    let fidx = self.frames.len() - 1;
                    self.frames[fidx].child = i;
                    if let Some(new) = self.execute(h, c, pos)? {
                        return Ok(Some(new));
                    }
                }
                Ok(None)
            }
            MatcherKind::OneOrMore(c) => {
                let mut cur = match self.execute(h, c, pos)? {
                    Some(new) => new,
                    None => return Ok(None),
                };
                loop {
                    match self.execute(h, c, cur)? {
                        // an iteration that consumes nothing (possible mid-recovery) ends the
                        // repetition rather than looping forever
                        Some(new) if new > cur => cur = new,
                        _ => break,
                    }
                }
                Ok(Some(cur))
            }
            MatcherKind::ZeroOrMore(c) => {
                let mut cur = pos;
                loop {
                    match self.execute(h, c, cur)? {
                        Some(new) if new > cur => cur = new,
                        _ => break,
                    }
                }
                Ok(Some(cur))
            }
            MatcherKind::Opt(c) => match self.execute(h, c, pos)? {
                Some(new) => Ok(Some(new)),
                None => Ok(Some(pos)),
            },
            MatcherKind::Test(c) => {
                let vsnap = self.vstack.snapshot();
                self.predicates += 1;
                let r = self.execute(h, c, pos);
                self.predicates -= 1;
                self.vstack.restore(vsnap);
                match r? {
                    Some(_) => Ok(Some(pos)),
                    None => Ok(None),
                }
            }
            MatcherKind::TestNot(c) => {
                let vsnap = self.vstack.snapshot();
                self.predicates += 1;
                let r = self.execute(h, c, pos);
                self.predicates -= 1;
                self.vstack.restore(vsnap);
                match r? {
                    Some(_) => Ok(None),
                    None => Ok(Some(pos)),
                }
            }
            MatcherKind::Action(aidx) => {
                if self.run_action(aidx, false)? {
                    Ok(Some(pos))
                } else {
                    Ok(None)
                }
            }
            MatcherKind::Empty => Ok(Some(pos)),
            MatcherKind::Nothing => Ok(None),
            MatcherKind::Eoi => {
                if self.buf.char_at(pos) == EOI {
                    Ok(Some(pos))
                } else {
                    Ok(None)
                }
            }
            MatcherKind::Ch(c) => {
                if self.buf.char_at(pos) == c {
                    Ok(Some(pos + 1))
                } else {
                    Ok(None)
                }
            }
            MatcherKind::ChRange(lo, hi) => {
                let c = self.buf.char_at(pos);
                if !is_reserved_char(c) && lo <= c && c <= hi {
                    Ok(Some(pos + 1))
                } else {
                    Ok(None)
                }
            }
            MatcherKind::AnyOf(ref cs) => {
                if cs.contains(&self.buf.char_at(pos)) {
                    Ok(Some(pos + 1))
                } else {
                    Ok(None)
                }
            }
            MatcherKind::Any => {
                if !is_reserved_char(self.buf.char_at(pos)) {
                    Ok(Some(pos + 1))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Run the action in slot `aidx`. During resynchronisation replay `in_recovery` is set and
    /// the caller ignores the result.
    pub(crate) fn run_action(
        &mut self,
        aidx: AIdx<StorageT>,
        in_recovery: bool,
    ) -> Result<bool, Fatal> {
        let actions = self.actions;
        let i = usize::from(aidx);
        if i >= actions.len() {
            return Err(Fatal::Grammar(InvalidGrammarError::new(
                None,
                "action slot has no function bound to it",
            )));
        }
        let span = self.last_span;
        let mut ctx = ActionCtx {
            vstack: &mut self.vstack,
            buffer: &*self.buf,
            matched_span: span,
            in_recovery,
        };
        Ok(actions[i](&mut ctx))
    }

    pub(crate) fn is_terminal(&self, midx: MIdx<StorageT>) -> bool {
        match *self.grm.matcher(midx) {
            MatcherKind::Ch(_)
            | MatcherKind::ChRange(_, _)
            | MatcherKind::AnyOf(_)
            | MatcherKind::Any => true,
            _ => false,
        }
    }

    /// Only matchers whose starter character is meaningful get reported as failure candidates:
    /// single-character terminals and end-of-input.
    fn reportable_leaf(&self, midx: MIdx<StorageT>) -> bool {
        if visit::is_single_char(self.grm, midx) {
            return true;
        }
        match *self.grm.matcher(midx) {
            MatcherKind::Eoi => true,
            _ => false,
        }
    }

    pub(crate) fn mark_error(&mut self) {
        let i = self.frames.len() - 1;
        self.frames[i].error = true;
    }

    pub(crate) fn mark_parent_error(&mut self) {
        let n = self.frames.len();
        if n >= 2 {
            self.frames[n - 2].error = true;
        }
    }

    fn notify_pre_parse(&mut self) {
        if self.listener_err.is_some() {
            return;
        }
        for l in self.listeners.iter_mut() {
            if let Err(e) = l.pre_parse() {
                self.listener_err = Some(e);
                return;
            }
        }
    }

    fn notify_pre_match(&mut self, midx: MIdx<StorageT>, pos: usize) {
        if self.listener_err.is_some() {
            return;
        }
        for l in self.listeners.iter_mut() {
            if let Err(e) = l.pre_match(midx, pos) {
                self.listener_err = Some(e);
                return;
            }
        }
    }

    fn notify_match_success(&mut self, midx: MIdx<StorageT>, start: usize, end: usize) {
        if self.listener_err.is_some() {
            return;
        }
        for l in self.listeners.iter_mut() {
            if let Err(e) = l.match_success(midx, start, end) {
                self.listener_err = Some(e);
                return;
            }
        }
    }

    fn notify_match_failure(&mut self, midx: MIdx<StorageT>, pos: usize) {
        if self.listener_err.is_some() {
            return;
        }
        for l in self.listeners.iter_mut() {
            if let Err(e) = l.match_failure(midx, pos) {
                self.listener_err = Some(e);
                return;
            }
        }
    }

    fn notify_post_parse(&mut self, matched: bool) {
        if self.listener_err.is_some() {
            return;
        }
        for l in self.listeners.iter_mut() {
            if let Err(e) = l.post_parse(matched) {
                self.listener_err = Some(e);
                return;
            }
        }
    }
}
