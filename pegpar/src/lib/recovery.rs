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

//! The error-recovering parse runner. When the basic run fails, the runner locates the first
//! failing index, reports which matchers failed there, and then repairs the buffer: it tries
//! deleting the offending character, inserting each plausible character, and replacing the
//! offending character, keeps whichever speculative edit lets the parse get furthest, and falls
//! back to resynchronisation (skipping input until something that may legally follow) when none
//! helps. Repairs are encoded *in the character stream* as marker characters, so the matcher
//! engine never learns about recovery: all marker interpretation happens in the handler defined
//! here.

use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

use indexmap::IndexSet;
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use pegrammar::peg::{visit, InvalidGrammarError, MatcherKind, PegGrammar};
use pegrammar::{MIdx, EOI};

use buffer::{
    InputBuffer, RecoveryBuffer, DEL_ERROR, INS_ERROR, RESYNC, RESYNC_END, RESYNC_EOI,
    RESYNC_START,
};
use events::ParseListener;
use parser::{
    run_once, ActionFn, Fatal, MRes, MatchHandler, MatcherPath, ParseError, ParseResult,
    RecoverState, ReportState, RunError, RunOutcome, RunState,
};
use vstack::ValueStack;

impl<'a, StorageT: 'static + fmt::Debug + Hash + PrimInt + Unsigned, ActionT: Clone>
    RunState<'a, StorageT, ActionT>
where
    usize: AsPrimitive<StorageT>,
{
    /// The recovering match handler, consulted at every matcher entry during locating, reporting,
    /// and final runs.
    pub(crate) fn recover_handle(
        &mut self,
        h: &mut MatchHandler<StorageT>,
        midx: MIdx<StorageT>,
        pos: usize,
    ) -> MRes {
        let grm = self.grm;
        if visit::is_single_char(grm, midx) {
            let c = self.buf.char_at(pos);
            if c == DEL_ERROR {
                // skip the marker and the deleted character, then retry through the handler:
                // a replacement leaves INS_ERROR two positions on, which must be interpreted
                // as part of the same attempt
                match self.dispatch(h, midx, pos + 2)? {
                    Some(new) => {
                        self.mark_parent_error();
                        Ok(Some(new))
                    }
                    None => Ok(None),
                }
            } else if c == INS_ERROR {
                // skip the marker and match for real against the inserted character
                match self.execute_real(h, midx, pos + 1)? {
                    Some(new) => {
                        self.mark_error();
                        Ok(Some(new))
                    }
                    None => Ok(None),
                }
            } else if c == RESYNC || c == RESYNC_START || c == RESYNC_END || c == RESYNC_EOI {
                // resync markers are the business of sequences, never of terminals
                Ok(None)
            } else {
                match self.execute_real(h, midx, pos)? {
                    Some(new) => {
                        let rec = h.rec_mut();
                        if new > rec.fringe {
                            rec.fringe = new;
                            rec.last_match_frames = Some(self.frames.clone());
                        }
                        Ok(Some(new))
                    }
                    None => Ok(None),
                }
            }
        } else {
            let is_seq = match *grm.matcher(midx) {
                MatcherKind::Seq(_) => true,
                _ => false,
            };
            let vsnap = self.vstack.snapshot();
            let nodes_mark = self.nodes.len();
            match self.execute_real(h, midx, pos)? {
                Some(new) => Ok(Some(new)),
                None => {
                    // the root matcher may resynchronise whatever its kind: without this, a
                    // grammar whose root is not a sequence could never overcome a resync
                    // marker and the runner would lose its totality guarantee
                    let is_root = self.frames.len() == 1;
                    if is_seq || is_root {
                        let fp = if is_seq { self.seq_fail } else { pos };
                        let fc = self.buf.char_at(fp);
                        if (fc == RESYNC || fc == RESYNC_START || fc == RESYNC_EOI)
                            && (is_root || self.qualifies_for_resync(h, fp))
                        {
                            self.vstack.restore(vsnap);
                            self.nodes.truncate(nodes_mark);
                            return self.resynchronize(h, midx, pos, fp);
                        }
                    }
                    Ok(None)
                }
            }
        }
    }

    /// A failing sequence resynchronises only if it owns the failure site: either it has already
    /// matched at least one character and sits on the path that reached the fringe, or no
    /// enclosing matcher is itself a sequence (i.e. it is the outermost candidate).
    fn qualifies_for_resync(&self, h: &MatchHandler<StorageT>, fp: usize) -> bool {
        let start = self.frames.last().map(|f| f.start).unwrap_or(0);
        if fp > start {
            if let Some(ref lmf) = h.rec().last_match_frames {
                let prefix = self.frames.len() <= lmf.len()
                    && self
                        .frames
                        .iter()
                        .zip(lmf.iter())
                        .all(|(x, y)| x.midx == y.midx && x.start == y.start);
                if prefix {
                    return true;
                }
            }
        }
        !self.frames[..self.frames.len() - 1]
            .iter()
            .any(|f| match *self.grm.matcher(f.midx) {
                MatcherKind::Seq(_) => true,
                _ => false,
            })
    }

    /// Turn the failing sequence at a resync marker into a successful match: replay its children
    /// in error-action mode to keep the value stack consistent, then skip illegal input up to a
    /// character some follow matcher could start with.
    fn resynchronize(
        &mut self,
        h: &mut MatchHandler<StorageT>,
        midx: MIdx<StorageT>,
        pos: usize,
        fp: usize,
    ) -> MRes {
        self.mark_error();
        let grm = self.grm;
        let children = match *grm.matcher(midx) {
            MatcherKind::Seq(ref cs) => cs.clone(),
            _ => Vec::new(),
        };
        // replay: children before the failure point run again for real; the first failing child
        // becomes an empty match; the rest contribute only their minimal action sets, run with
        // the in-recovery flag and their verdicts ignored
        let mut cur = pos;
        let mut tag = 0;
        for (i, &c) in children.iter().enumerate() {
            if tag == 0 {
                let fidx = self.frames.len() - 1;
                self.frames[fidx].child = i;
                match self.execute(h, c, cur)? {
                    Some(new) => cur = new,
                    None => tag = 1,
                }
            } else if let Some(aidxs) = visit::collect_resync_actions(grm, c) {
                for aidx in aidxs {
                    let _ = self.run_action(aidx, true)?;
                }
            }
        }
        // the replay cursor is discarded: gobbling proceeds from the failure point
        let fc = self.buf.char_at(fp);
        if fc == RESYNC {
            // first encounter: find where legal input can resume, record the range, and turn
            // the marker into a RESYNC_START .. RESYNC_END pair for later passes
            let follow = self.follow_matchers();
            let mut p = fp + 1;
            loop {
                let c = self.buf.char_at(p);
                if c == EOI || self.in_follow_starters(&follow, c) {
                    break;
                }
                p += 1;
            }
            h.rec_mut().resync_end = Some(p);
            if let Err(e) = self.buf.replace_inserted(fp, RESYNC_START) {
                return Err(Fatal::Invariant(format!("{}", e)));
            }
            self.buf.insert(p, RESYNC_END);
            Ok(Some(p + 1))
        } else if fc == RESYNC_START {
            let mut p = fp + 1;
            loop {
                let c = self.buf.char_at(p);
                if c == RESYNC_END {
                    return Ok(Some(p + 1));
                }
                if c == EOI {
                    return Err(Fatal::Invariant(
                        "unterminated resynchronisation range".to_owned(),
                    ));
                }
                p += 1;
            }
        } else if fc == RESYNC_EOI {
            // nothing left to skip; the error was captured when the marker was placed
            Ok(Some(fp))
        } else {
            Err(Fatal::Invariant(
                "resynchronisation attempted outside a resync marker".to_owned(),
            ))
        }
    }

    /// The set of matchers that may legally follow the failing sequence, computed by climbing
    /// its ancestor chain: a sequence ancestor contributes its later siblings (and completes the
    /// set at the first one that must consume input); repetitions contribute their body, since
    /// it may come round again.
    fn follow_matchers(&self) -> Vob {
        let grm = self.grm;
        let mut follow = Vob::new();
        follow.resize(grm.matchers_len(), false);
        let mut i = self.frames.len();
        while i > 1 {
            let parent = &self.frames[i - 2];
            match *grm.matcher(parent.midx) {
                MatcherKind::Seq(ref cs) => {
                    let mut complete = false;
                    for &c in cs[parent.child + 1..].iter() {
                        follow.set(usize::from(c), true);
                        if !grm.matches_empty(c) {
                            complete = true;
                            break;
                        }
                    }
                    if complete {
                        return follow;
                    }
                }
                MatcherKind::OneOrMore(c) | MatcherKind::ZeroOrMore(c) => {
                    follow.set(usize::from(c), true);
                }
                _ => (),
            }
            i -= 1;
        }
        follow
    }

    fn in_follow_starters(&self, follow: &Vob, c: char) -> bool {
        for i in 0..self.grm.matchers_len() {
            if follow[i] && visit::is_starter_char(self.grm, MIdx::new(i), c) {
                return true;
            }
        }
        false
    }
}

/// The error-recovering parse runner: runs the grammar over an input and always comes back with
/// a completed parse, plus one [`ParseError`](../parser/struct.ParseError.html) per position it
/// had to repair.
pub struct RecoveringParser<'a, StorageT: 'a + Hash + Eq, ActionT> {
    grm: &'a PegGrammar<StorageT>,
    actions: Vec<ActionFn<ActionT>>,
    timeout: Option<Duration>,
    listeners: Vec<Box<ParseListener<StorageT>>>,
}

impl<'a, StorageT: 'static + fmt::Debug + Hash + PrimInt + Unsigned, ActionT: Clone>
    RecoveringParser<'a, StorageT, ActionT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Create a runner for `grm`. `actions` supplies the code for the grammar's action slots, in
    /// slot order; handing over the wrong number of functions is a grammar defect.
    pub fn new(
        grm: &'a PegGrammar<StorageT>,
        actions: Vec<ActionFn<ActionT>>,
    ) -> Result<Self, InvalidGrammarError> {
        if actions.len() != grm.actions_len() {
            return Err(InvalidGrammarError::new(
                None,
                "wrong number of action functions for this grammar",
            ));
        }
        Ok(RecoveringParser {
            grm,
            actions,
            timeout: None,
            listeners: Vec::new(),
        })
    }

    /// Give up (with [`RunError::Timeout`](../parser/enum.RunError.html)) if a parse is still
    /// running after `d`. The deadline is checked on every sequence failure.
    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout = Some(d);
        self
    }

    /// Subscribe a listener to this runner's parse events.
    pub fn register_listener(&mut self, listener: Box<ParseListener<StorageT>>) {
        self.listeners.push(listener);
    }

    pub fn run(
        &mut self,
        input: &str,
    ) -> Result<ParseResult<StorageT, ActionT>, RunError<StorageT, ActionT>> {
        self.run_buffer(InputBuffer::new(input))
    }

    pub fn run_buffer(
        &mut self,
        input: InputBuffer,
    ) -> Result<ParseResult<StorageT, ActionT>, RunError<StorageT, ActionT>> {
        let finish_by = self.timeout.map(|d| Instant::now() + d);
        let mut buf = RecoveryBuffer::new(input);
        let mut errors = Vec::new();
        match self.parse_loop(&mut buf, &mut errors, finish_by) {
            Ok(out) => Ok(ParseResult {
                matched: true,
                tree: out.tree,
                vstack: out.vstack,
                errors,
                buffer: buf,
            }),
            Err(Fatal::Timeout) => Err(RunError::Timeout {
                partial: Box::new(ParseResult {
                    matched: false,
                    tree: None,
                    vstack: ValueStack::new(),
                    errors,
                    buffer: buf,
                }),
            }),
            Err(Fatal::Invariant(s)) => Err(RunError::InvariantViolation(s)),
            Err(Fatal::Grammar(e)) => Err(RunError::InvalidGrammar(e)),
            Err(Fatal::Listener(e)) => Err(RunError::Listener(e)),
        }
    }

    fn parse_loop(
        &mut self,
        buf: &mut RecoveryBuffer,
        errors: &mut Vec<ParseError<StorageT>>,
        finish_by: Option<Instant>,
    ) -> Result<RunOutcome<StorageT, ActionT>, Fatal> {
        // on clean input the recovering runner must be indistinguishable from the basic one
        let basic = run_once(
            self.grm,
            &self.actions,
            buf,
            &mut self.listeners,
            &mut MatchHandler::Passthrough,
            true,
            finish_by,
        )?;
        if basic.matched {
            return Ok(basic);
        }
        let mut error_index = self.locate(buf, errors, finish_by)?;
        while let Some(eidx) = error_index {
            let failed = self.report(buf, eidx, finish_by)?;
            errors.push(ParseError::new(eidx, failed));
            error_index = self.fix_error(buf, eidx, errors, finish_by)?;
        }
        // every error has been overcome, so this run cannot fail
        let fin = run_once(
            self.grm,
            &self.actions,
            buf,
            &mut self.listeners,
            &mut MatchHandler::Recover(RecoverState::new()),
            true,
            finish_by,
        )?;
        if !fin.matched {
            return Err(Fatal::Invariant(
                "final parse run did not match".to_owned(),
            ));
        }
        Ok(fin)
    }

    /// A locating run: recovery handler on, parse-tree building off. Answers `None` if the run
    /// matched, otherwise the rightmost index a match attempt failed at. If a fresh resync
    /// marker was expanded during the run, its range end is attached to the current error.
    fn locate(
        &mut self,
        buf: &mut RecoveryBuffer,
        errors: &mut Vec<ParseError<StorageT>>,
        finish_by: Option<Instant>,
    ) -> Result<Option<usize>, Fatal> {
        let mut h = MatchHandler::Recover(RecoverState::new());
        let out = run_once(
            self.grm,
            &self.actions,
            buf,
            &mut self.listeners,
            &mut h,
            false,
            finish_by,
        )?;
        let rec = match h {
            MatchHandler::Recover(r) => r,
            _ => unreachable!(),
        };
        if let Some(end) = rec.resync_end {
            if let Some(e) = errors.last_mut() {
                e.set_end(end);
            }
        }
        if out.matched {
            Ok(None)
        } else {
            match rec.furthest_fail {
                Some(f) => Ok(Some(f)),
                None => Err(Fatal::Invariant(
                    "failing run recorded no failure index".to_owned(),
                )),
            }
        }
    }

    /// A reporting run: like a locating run, but at `at` it records every matcher path that was
    /// tried and failed, in first-seen order without duplicates.
    fn report(
        &mut self,
        buf: &mut RecoveryBuffer,
        at: usize,
        finish_by: Option<Instant>,
    ) -> Result<Vec<MatcherPath<StorageT>>, Fatal> {
        let mut h = MatchHandler::Report(ReportState {
            rec: RecoverState::new(),
            at,
            failed: IndexSet::new(),
        });
        run_once(
            self.grm,
            &self.actions,
            buf,
            &mut self.listeners,
            &mut h,
            false,
            finish_by,
        )?;
        match h {
            MatchHandler::Report(rp) => Ok(rp.failed.into_iter().collect()),
            _ => unreachable!(),
        }
    }

    /// One iteration of the repair loop at `eidx`: try deleting the offending character, try
    /// inserting each plausible character, try replacing; commit whichever got the parse
    /// furthest, or place a resync marker if none got anywhere. Answers the next error index,
    /// or `None` once a locating run reports success.
    fn fix_error(
        &mut self,
        buf: &mut RecoveryBuffer,
        eidx: usize,
        errors: &mut Vec<ParseError<StorageT>>,
        finish_by: Option<Instant>,
    ) -> Result<Option<usize>, Fatal> {
        let at_eoi = buf.char_at(eidx) == EOI;

        // try single-character deletion
        buf.insert(eidx, DEL_ERROR);
        let next_after_del = match self.locate(buf, errors, finish_by)? {
            None => {
                shift_current(errors, 1);
                return Ok(None);
            }
            Some(next) => {
                undo(buf, eidx)?;
                next
            }
        };

        // every starter character of a matcher that failed here is an insertion candidate
        let starters = self.insertion_candidates(errors)?;

        // try the best single-character insertion
        let mut best_ins: Option<(char, usize)> = None;
        for &c in starters.iter() {
            buf.insert(eidx, c);
            buf.insert(eidx, INS_ERROR);
            match self.locate(buf, errors, finish_by)? {
                None => {
                    shift_current(errors, 2);
                    return Ok(None);
                }
                Some(next) => {
                    undo(buf, eidx)?;
                    undo(buf, eidx)?;
                    if best_ins.map_or(true, |(_, b)| next > b) {
                        best_ins = Some((c, next));
                    }
                }
            }
        }

        // try the best single-character replacement: a deletion plus an insertion two positions
        // further on. Meaningless when the offending "character" is the end of input.
        let mut best_rep: Option<(char, usize)> = None;
        if !at_eoi {
            buf.insert(eidx, DEL_ERROR);
            for &c in starters.iter() {
                buf.insert(eidx + 2, c);
                buf.insert(eidx + 2, INS_ERROR);
                match self.locate(buf, errors, finish_by)? {
                    None => {
                        shift_current(errors, 1);
                        return Ok(None);
                    }
                    Some(next) => {
                        undo(buf, eidx + 2)?;
                        undo(buf, eidx + 2)?;
                        if best_rep.map_or(true, |(_, b)| next > b) {
                            best_rep = Some((c, next));
                        }
                    }
                }
            }
            undo(buf, eidx)?;
        }

        // commit whichever single-character fix made the most progress
        let mut best = next_after_del;
        if let Some((_, n)) = best_ins {
            if n > best {
                best = n;
            }
        }
        if let Some((_, n)) = best_rep {
            if n > best {
                best = n;
            }
        }
        if best > eidx {
            if next_after_del == best {
                buf.insert(eidx, DEL_ERROR);
                shift_current(errors, 1);
            } else if best_ins.map_or(false, |(_, n)| n == best) {
                let (c, _) = best_ins.unwrap();
                buf.insert(eidx, c);
                buf.insert(eidx, INS_ERROR);
                shift_current(errors, 2);
            } else {
                let (c, _) = best_rep.unwrap();
                buf.insert(eidx + 2, c);
                buf.insert(eidx + 2, INS_ERROR);
                buf.insert(eidx, DEL_ERROR);
                shift_current(errors, 1);
            }
            return Ok(Some(best));
        }

        // no single-character fix overcomes this error: resynchronise
        if at_eoi {
            buf.insert(eidx, RESYNC_EOI);
            shift_current(errors, 1);
            return Ok(None);
        }
        buf.insert(eidx, RESYNC);
        shift_current(errors, 1);
        self.locate(buf, errors, finish_by)
    }

    fn insertion_candidates(
        &self,
        errors: &Vec<ParseError<StorageT>>,
    ) -> Result<Vec<char>, Fatal> {
        let mut out = Vec::new();
        if let Some(e) = errors.last() {
            for path in e.failed_matchers().iter() {
                let leaf = match path.leaf() {
                    Some(l) => l,
                    None => continue,
                };
                match visit::starter_char(self.grm, leaf.midx) {
                    // EOI cannot be inserted; Any has no canonical character to offer
                    Ok(Some(c)) => {
                        if c != EOI && !out.contains(&c) {
                            out.push(c);
                        }
                    }
                    Ok(None) => (),
                    Err(e) => return Err(Fatal::Grammar(e)),
                }
            }
        }
        Ok(out)
    }
}

fn shift_current<StorageT>(errors: &mut Vec<ParseError<StorageT>>, n: i64) {
    if let Some(e) = errors.last_mut() {
        e.shift_index_delta_by(n);
    }
}

fn undo(buf: &mut RecoveryBuffer, i: usize) -> Result<(), Fatal> {
    buf.undo_insert(i)
        .map_err(|e| Fatal::Invariant(format!("{}", e)))
}

#[cfg(test)]
mod test {
    use std::cell::Cell;
    use std::error::Error;
    use std::fmt;
    use std::rc::Rc;
    use std::time::Duration;

    use buffer::{
        InputBuffer, RecoveryBuffer, DEL_ERROR, INS_ERROR, RESYNC_END, RESYNC_EOI, RESYNC_START,
    };
    use events::ParseListener;
    use parser::{Frame, ParseResult, RunError, RunState};
    use pegrammar::peg::{GrammarBuilder, PegGrammar};
    use pegrammar::MIdx;
    use super::RecoveringParser;
    use ActionFn;
    use ValueStack;

    fn abc_grammar() -> PegGrammar<u16> {
        // S: 'a' 'b' 'c' EOI
        let mut gb = GrammarBuilder::new();
        let a = gb.ch('a');
        let b = gb.ch('b');
        let c = gb.ch('c');
        let eoi = gb.eoi();
        let root = gb.seq(vec![a, b, c, eoi]);
        gb.label(root, "S");
        gb.finish(root).unwrap()
    }

    fn do_parse(grm: &PegGrammar<u16>, input: &str) -> ParseResult<u16, char> {
        do_parse_actions(grm, vec![], input)
    }

    fn do_parse_actions(
        grm: &PegGrammar<u16>,
        actions: Vec<ActionFn<char>>,
        input: &str,
    ) -> ParseResult<u16, char> {
        RecoveringParser::new(grm, actions).unwrap().run(input).unwrap()
    }

    fn original_error_indices(r: &ParseResult<u16, char>) -> Vec<usize> {
        r.errors
            .iter()
            .map(|e| r.buffer.original_index(e.start_index()))
            .collect()
    }

    #[test]
    fn test_clean_input_is_untouched() {
        let grm = abc_grammar();
        let r = do_parse(&grm, "abc");
        assert!(r.matched);
        assert!(r.errors.is_empty());
        assert_eq!(r.buffer.len(), 3);
        let tree = r.tree.unwrap();
        assert_eq!((tree.start, tree.end), (0, 3));
        assert!(!tree.error);
    }

    #[test]
    fn test_replacement() {
        // "abd": 'd' must be replaced by 'c', leaving [a, b, DEL, d, INS, c]
        let grm = abc_grammar();
        let r = do_parse(&grm, "abd");
        assert!(r.matched);
        assert_eq!(original_error_indices(&r), vec![2]);
        assert_eq!(r.buffer.char_at(0), 'a');
        assert_eq!(r.buffer.char_at(1), 'b');
        assert_eq!(r.buffer.char_at(2), DEL_ERROR);
        assert_eq!(r.buffer.char_at(3), 'd');
        assert_eq!(r.buffer.char_at(4), INS_ERROR);
        assert_eq!(r.buffer.char_at(5), 'c');
        assert_eq!(r.buffer.extract(4, 6), "c");
        assert_eq!(r.buffer.extract(0, 6), "abdc");
    }

    #[test]
    fn test_insertion() {
        // "ac": a 'b' must be inserted, leaving [a, INS, b, c]
        let grm = abc_grammar();
        let r = do_parse(&grm, "ac");
        assert!(r.matched);
        assert_eq!(original_error_indices(&r), vec![1]);
        assert_eq!(r.buffer.char_at(0), 'a');
        assert_eq!(r.buffer.char_at(1), INS_ERROR);
        assert_eq!(r.buffer.char_at(2), 'b');
        assert_eq!(r.buffer.char_at(3), 'c');
    }

    #[test]
    fn test_deletion() {
        // "axbc": the 'x' must be deleted, leaving [a, DEL, x, b, c]
        let grm = abc_grammar();
        let r = do_parse(&grm, "axbc");
        assert!(r.matched);
        assert_eq!(original_error_indices(&r), vec![1]);
        assert_eq!(r.buffer.char_at(1), DEL_ERROR);
        assert_eq!(r.buffer.char_at(2), 'x');
        assert_eq!(r.buffer.char_at(3), 'b');
        assert_eq!(r.buffer.extract(0, r.buffer.len()), "axbc");
    }

    #[test]
    fn test_deletion_in_repetition() {
        // S: 'a'+ ';' EOI over "aa?a;": the '?' must be deleted
        let mut gb = GrammarBuilder::new();
        let a = gb.ch('a');
        let rep = gb.one_or_more(a);
        let semi = gb.ch(';');
        let eoi = gb.eoi();
        let root = gb.seq(vec![rep, semi, eoi]);
        let grm = gb.finish(root).unwrap();
        let r = do_parse(&grm, "aa?a;");
        assert!(r.matched);
        assert_eq!(original_error_indices(&r), vec![2]);
        assert_eq!(r.buffer.char_at(2), DEL_ERROR);
        assert_eq!(r.buffer.char_at(3), '?');
    }

    fn ab_semi_grammar() -> PegGrammar<u16> {
        // S: ('a' | 'b')+ ';' EOI
        let mut gb = GrammarBuilder::new();
        let a = gb.ch('a');
        let b = gb.ch('b');
        let ab = gb.first_of(vec![a, b]);
        let rep = gb.one_or_more(ab);
        let semi = gb.ch(';');
        let eoi = gb.eoi();
        let root = gb.seq(vec![rep, semi, eoi]);
        gb.finish(root).unwrap()
    }

    #[test]
    fn test_resync_range() {
        // "aab;;": nothing can be inserted for EOI, so the trailing ';' is resynchronised away
        // and the error covers it as a range
        let grm = ab_semi_grammar();
        let r = do_parse(&grm, "aab;;");
        assert!(r.matched);
        assert_eq!(r.errors.len(), 1);
        let e = &r.errors[0];
        assert!(e.is_range());
        assert_eq!(e.start_index(), 5);
        assert_eq!(e.end_index(), 6);
        assert_eq!(r.buffer.char_at(4), RESYNC_START);
        assert_eq!(r.buffer.char_at(5), ';');
        assert_eq!(r.buffer.char_at(6), RESYNC_END);
        // the skipped text is still extractable, markers aside
        assert_eq!(r.buffer.extract(e.start_index(), e.end_index()), ";");
    }

    #[test]
    fn test_resync_gobbles_run_of_junk() {
        let grm = ab_semi_grammar();
        let r = do_parse(&grm, "aab;?!?!");
        assert!(r.matched);
        assert_eq!(r.errors.len(), 1);
        let e = &r.errors[0];
        assert!(e.is_range());
        assert_eq!(r.buffer.extract(e.start_index(), e.end_index()), "?!?!");
    }

    #[test]
    fn test_multiple_errors_in_order() {
        // "a?c?": a replacement at original index 1, then trailing junk resynchronised
        let grm = abc_grammar();
        let r = do_parse(&grm, "a?c?");
        assert!(r.matched);
        assert_eq!(r.errors.len(), 2);
        assert!(r.errors[0].start_index() < r.errors[1].start_index());
        assert!(!r.errors[0].is_range());
        assert!(r.errors[1].is_range());
        assert_eq!(original_error_indices(&r), vec![1, 3]);
    }

    #[test]
    fn test_missing_tail_is_inserted() {
        // "a": 'b' and 'c' are inserted one repair iteration at a time
        let grm = abc_grammar();
        let r = do_parse(&grm, "a");
        assert!(r.matched);
        assert_eq!(r.errors.len(), 2);
        assert_eq!(r.buffer.extract(0, r.buffer.len()), "abc");
    }

    #[test]
    fn test_totality() {
        let grm = abc_grammar();
        for input in &["", "x", "ba", "abcd", "???", "ccc", "abab", "aabbcc"] {
            let r = do_parse(&grm, input);
            assert!(r.matched, "input {:?} did not match", input);
            assert!(!r.errors.is_empty(), "input {:?} reported no errors", input);
            // progress: error start indices strictly increase
            for w in r.errors.windows(2) {
                assert!(
                    w[0].start_index() < w[1].start_index(),
                    "input {:?} produced out-of-order errors",
                    input
                );
            }
        }
    }

    #[test]
    fn test_original_text_is_preserved() {
        let grm = abc_grammar();
        for input in &["abd", "ac", "axbc", "a?c?", "x"] {
            let r = do_parse(&grm, input);
            for e in &r.errors {
                let oi = r.buffer.original_index(e.start_index());
                let orig = r.buffer.original();
                // the reported position projects onto a real character of the original input
                // (or its end), and extraction there reproduces the original text
                assert!(oi <= orig.len());
                assert_eq!(
                    orig.extract(oi, oi + 1),
                    input.chars().skip(oi).take(1).collect::<String>()
                );
            }
        }
    }

    #[test]
    fn test_reported_failed_matchers() {
        // "abd" fails at the Ch('c') matcher: its path must be reported
        let grm = abc_grammar();
        let r = do_parse(&grm, "abd");
        let e = &r.errors[0];
        assert!(!e.failed_matchers().is_empty());
        let leaves = e
            .failed_matchers()
            .iter()
            .map(|p| p.leaf().unwrap().midx)
            .collect::<Vec<_>>();
        assert!(leaves.contains(&MIdx(2u16)));
        assert_eq!(e.failed_matchers()[0].pp(&grm), "S -> 2");
    }

    #[test]
    fn test_value_stack_consistency_under_resync() {
        // item: ('a' | 'b') push; S: item+ ';' EOI mark — "aab;;" resynchronises S at the
        // second ';' with the mark action *after* the failure point, so it must be replayed in
        // error-action mode (observable through the in_recovery flag)
        let mut gb = GrammarBuilder::<u16>::new();
        let a = gb.ch('a');
        let b = gb.ch('b');
        let ab = gb.first_of(vec![a, b]);
        let push = gb.action();
        let item = gb.seq(vec![ab, push]);
        let rep = gb.one_or_more(item);
        let semi = gb.ch(';');
        let eoi = gb.eoi();
        let mark = gb.action();
        let root = gb.seq(vec![rep, semi, eoi, mark]);
        let grm = gb.finish(root).unwrap();
        let actions: Vec<ActionFn<char>> = vec![
            Box::new(|ctx| {
                let t = ctx.matched_text();
                ctx.vstack.push(t.chars().next().unwrap());
                true
            }),
            Box::new(|ctx| {
                ctx.vstack.push(if ctx.in_recovery { 'R' } else { 'M' });
                true
            }),
        ];
        let mut parser = RecoveringParser::new(&grm, actions).unwrap();
        let r = parser.run("aab;;").unwrap();
        assert!(r.matched);
        assert_eq!(r.errors.len(), 1);
        assert!(r.errors[0].is_range());
        // stack depth as if the sequence had matched cleanly; the mark was replayed in
        // recovery mode
        assert_eq!(r.vstack.to_vec(), vec!['R', 'b', 'a', 'a']);
    }

    #[test]
    fn test_resync_with_non_sequence_root() {
        // the root may resynchronise whatever its kind: a bare EOI root over junk input must
        // still complete
        let mut gb = GrammarBuilder::<u16>::new();
        let eoi = gb.eoi();
        let grm = gb.finish(eoi).unwrap();
        let r = do_parse(&grm, "x");
        assert!(r.matched);
        assert_eq!(r.errors.len(), 1);
        assert!(r.errors[0].is_range());
    }

    #[test]
    fn test_resync_eoi_terminates() {
        // S: 'a' Nothing — Nothing cannot be repaired and the failure sits at the end of
        // input, so a RESYNC_EOI marker must end the repair loop
        let mut gb = GrammarBuilder::<u16>::new();
        let a = gb.ch('a');
        let n = gb.nothing();
        let root = gb.seq(vec![a, n]);
        let grm = gb.finish(root).unwrap();
        let r = do_parse(&grm, "a");
        assert!(r.matched);
        assert_eq!(r.errors.len(), 1);
        assert!(!r.errors[0].is_range());
        assert_eq!(r.buffer.char_at(1), RESYNC_EOI);
    }

    #[test]
    fn test_missing_everything_at_eoi() {
        // S: 'a' 'b' over "": both characters are inserted, then parsing completes
        let mut gb = GrammarBuilder::new();
        let a = gb.ch('a');
        let b = gb.ch('b');
        let root = gb.seq(vec![a, b]);
        let grm = gb.finish(root).unwrap();
        let r = do_parse(&grm, "");
        assert!(r.matched);
        assert_eq!(r.errors.len(), 2);
        assert_eq!(r.buffer.extract(0, r.buffer.len()), "ab");
    }

    #[test]
    fn test_follow_matchers_climb() {
        // root: Seq[ZeroOrMore(stmt), eoi]; stmt: Seq['x', 'y'] — from inside stmt, both stmt
        // itself (the repetition may come round again) and eoi (a nullable later sibling of the
        // repetition) may follow
        let mut gb = GrammarBuilder::<u16>::new();
        let x = gb.ch('x');
        let y = gb.ch('y');
        let stmt = gb.seq(vec![x, y]);
        let zom = gb.zero_or_more(stmt);
        let eoi = gb.eoi();
        let root = gb.seq(vec![zom, eoi]);
        let grm = gb.finish(root).unwrap();
        let mut buf = RecoveryBuffer::new(InputBuffer::new(""));
        let mut listeners = Vec::new();
        let actions: Vec<ActionFn<char>> = Vec::new();
        let st = RunState {
            grm: &grm,
            actions: &actions,
            buf: &mut buf,
            vstack: ValueStack::new(),
            listeners: &mut listeners,
            listener_err: None,
            finish_by: None,
            build_tree: false,
            predicates: 0,
            frames: vec![
                Frame { midx: root, start: 0, child: 0, error: false },
                Frame { midx: zom, start: 0, child: 0, error: false },
                Frame { midx: stmt, start: 0, child: 1, error: false },
            ],
            nodes: Vec::new(),
            seq_fail: 0,
            last_span: (0, 0),
        };
        let follow = st.follow_matchers();
        assert!(follow[usize::from(stmt)]);
        assert!(follow[usize::from(eoi)]);
        assert!(!follow[usize::from(y)]);
        assert!(st.in_follow_starters(&follow, 'x'));
        assert!(!st.in_follow_starters(&follow, 'y'));
    }

    struct CountingListener {
        pre_parses: Rc<Cell<usize>>,
        post_parses: Rc<Cell<usize>>,
        events: Rc<Cell<usize>>,
    }

    impl ParseListener<u16> for CountingListener {
        fn pre_parse(&mut self) -> Result<(), Box<Error>> {
            self.pre_parses.set(self.pre_parses.get() + 1);
            Ok(())
        }

        fn pre_match(&mut self, _: MIdx<u16>, _: usize) -> Result<(), Box<Error>> {
            self.events.set(self.events.get() + 1);
            Ok(())
        }

        fn post_parse(&mut self, _: bool) -> Result<(), Box<Error>> {
            self.post_parses.set(self.post_parses.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_listeners_observe_every_run() {
        let grm = abc_grammar();
        let pre_parses = Rc::new(Cell::new(0));
        let post_parses = Rc::new(Cell::new(0));
        let events = Rc::new(Cell::new(0));
        let mut parser = RecoveringParser::<u16, char>::new(&grm, vec![]).unwrap();
        parser.register_listener(Box::new(CountingListener {
            pre_parses: Rc::clone(&pre_parses),
            post_parses: Rc::clone(&post_parses),
            events: Rc::clone(&events),
        }));
        let r = parser.run("abd").unwrap();
        assert!(r.matched);
        // basic + locating + reporting + candidate + final runs: several, and balanced
        assert!(pre_parses.get() > 2);
        assert_eq!(pre_parses.get(), post_parses.get());
        assert!(events.get() > 0);
    }

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl Error for Boom {}

    struct FailingListener;

    impl ParseListener<u16> for FailingListener {
        fn post_parse(&mut self, _: bool) -> Result<(), Box<Error>> {
            Err(Box::new(Boom))
        }
    }

    #[test]
    fn test_listener_error_is_fatal() {
        let grm = abc_grammar();
        let mut parser = RecoveringParser::<u16, char>::new(&grm, vec![]).unwrap();
        parser.register_listener(Box::new(FailingListener));
        match parser.run("abc") {
            Err(RunError::Listener(e)) => assert_eq!(format!("{}", e), "boom"),
            _ => panic!("listener error was not surfaced"),
        }
    }

    #[test]
    fn test_timeout() {
        let grm = abc_grammar();
        // a zero budget is exhausted at the first sequence failure
        let mut parser = RecoveringParser::<u16, char>::new(&grm, vec![])
            .unwrap()
            .timeout(Duration::from_millis(0));
        match parser.run("abd") {
            Err(RunError::Timeout { partial }) => assert!(!partial.matched),
            _ => panic!("expected a timeout"),
        }
        // whereas clean input never fails a sequence and parses fine
        let mut parser = RecoveringParser::<u16, char>::new(&grm, vec![])
            .unwrap()
            .timeout(Duration::from_millis(0));
        assert!(parser.run("abc").unwrap().matched);
    }

    #[test]
    fn test_wrong_action_count_is_rejected() {
        let grm = abc_grammar();
        let actions: Vec<ActionFn<char>> = vec![Box::new(|_| true)];
        assert!(RecoveringParser::new(&grm, actions).is_err());
    }
}
