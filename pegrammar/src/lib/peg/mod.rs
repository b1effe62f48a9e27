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

//! The matcher arena, the grammar builder, and construction-time validation.

use std::error::Error;
use std::fmt;
use std::marker::PhantomData;

use fnv::FnvHashMap;
use num_traits::{AsPrimitive, PrimInt, Unsigned};
use vob::Vob;

use idxnewtype::{AIdx, MIdx};
use is_reserved_char;

mod epsilon;
pub mod visit;

/// The matcher kinds a recovering runtime distinguishes. Children are arena indices, so recursive
/// rules are ordinary index cycles.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MatcherKind<StorageT> {
    /// Match every child in order.
    Seq(Vec<MIdx<StorageT>>),
    /// Ordered choice: match the first child that succeeds.
    FirstOf(Vec<MIdx<StorageT>>),
    /// Match the child once, then greedily as often as it consumes input.
    OneOrMore(MIdx<StorageT>),
    /// Match the child greedily as often as it consumes input; always succeeds.
    ZeroOrMore(MIdx<StorageT>),
    /// Match the child if possible; always succeeds.
    Opt(MIdx<StorageT>),
    /// Positive lookahead: succeed iff the child matches, consuming nothing.
    Test(MIdx<StorageT>),
    /// Negative lookahead: succeed iff the child fails, consuming nothing.
    TestNot(MIdx<StorageT>),
    /// Run the user code in the given action slot against the value stack.
    Action(AIdx<StorageT>),
    /// Always succeed, consuming nothing.
    Empty,
    /// Always fail.
    Nothing,
    /// A single-character terminal.
    Ch(char),
    /// Any character within the (inclusive) range.
    ChRange(char, char),
    /// Any character in the given set.
    AnyOf(Vec<char>),
    /// Any character at all (but not end of input).
    Any,
    /// End of input. Consumes nothing and, unlike the terminals above, never takes part in
    /// single-character repair.
    Eoi,
}

/// An immutable PEG: an arena of matchers, a root, per-matcher labels, and the results of
/// nullability analysis.
#[derive(Debug)]
pub struct PegGrammar<StorageT> {
    matchers: Vec<MatcherKind<StorageT>>,
    labels: Vec<Option<String>>,
    root: MIdx<StorageT>,
    actions_len: usize,
    epsilon: Vob,
}

impl<StorageT: 'static + PrimInt + Unsigned> PegGrammar<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    /// Return the matcher at `midx`.
    ///
    /// # Panics
    ///
    /// If `midx` doesn't exist.
    pub fn matcher(&self, midx: MIdx<StorageT>) -> &MatcherKind<StorageT> {
        &self.matchers[usize::from(midx)]
    }

    /// Return the label of `midx`, if it has one.
    pub fn label(&self, midx: MIdx<StorageT>) -> Option<&str> {
        self.labels[usize::from(midx)].as_ref().map(|x| x.as_str())
    }

    /// The root matcher of this grammar.
    pub fn root(&self) -> MIdx<StorageT> {
        self.root
    }

    /// How many matchers does this grammar have?
    pub fn matchers_len(&self) -> usize {
        self.matchers.len()
    }

    /// How many action slots does this grammar have? The runtime must supply exactly this many
    /// action functions, in slot order.
    pub fn actions_len(&self) -> usize {
        self.actions_len
    }

    /// Can the matcher at `midx` succeed without consuming any input?
    pub fn matches_empty(&self, midx: MIdx<StorageT>) -> bool {
        self.epsilon[usize::from(midx)]
    }

    /// Return an iterator which produces (in order, from zero) all this grammar's matcher
    /// indices.
    pub fn iter_midxs(&self) -> MIdxIter<StorageT> {
        MIdxIter {
            cur: 0,
            len: self.matchers.len(),
            phantom: PhantomData,
        }
    }
}

pub struct MIdxIter<StorageT> {
    cur: usize,
    len: usize,
    phantom: PhantomData<StorageT>,
}

impl<StorageT: 'static + PrimInt + Unsigned> Iterator for MIdxIter<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    type Item = MIdx<StorageT>;

    fn next(&mut self) -> Option<MIdx<StorageT>> {
        if self.cur < self.len {
            let midx = MIdx::new(self.cur);
            self.cur += 1;
            Some(midx)
        } else {
            None
        }
    }
}

/// The various different possible grammar construction errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GrammarDefnErrorKind {
    /// A matcher slot was reserved but never defined.
    UndefinedMatcher,
    /// A matcher references a child index outside the arena.
    ChildOutOfRange,
    /// A terminal matches a reserved code point.
    ReservedChar(char),
    /// A sequence or ordered choice has no children.
    EmptyCombinator,
    /// An `AnyOf` terminal has an empty character set.
    EmptyMatchSet,
    /// The body of a repetition can match without consuming input.
    RepetitionMatchesEmpty,
    /// An action matcher references a slot that was never allocated.
    ActionOutOfRange,
    /// A matcher slot was defined twice.
    AlreadyDefined,
    /// A label names a matcher outside the arena.
    LabelOutOfRange,
}

/// A grammar construction error, pinpointing the offending matcher.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GrammarDefnError {
    pub kind: GrammarDefnErrorKind,
    pub midx: usize,
}

impl fmt::Display for GrammarDefnError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self.kind {
            GrammarDefnErrorKind::UndefinedMatcher => "Matcher reserved but never defined",
            GrammarDefnErrorKind::ChildOutOfRange => "Child matcher index out of range",
            GrammarDefnErrorKind::ReservedChar(_) => "Terminal matches a reserved code point",
            GrammarDefnErrorKind::EmptyCombinator => "Sequence or choice has no children",
            GrammarDefnErrorKind::EmptyMatchSet => "Character set terminal is empty",
            GrammarDefnErrorKind::RepetitionMatchesEmpty => {
                "Repetition body can match the empty string"
            }
            GrammarDefnErrorKind::ActionOutOfRange => "Action slot was never allocated",
            GrammarDefnErrorKind::AlreadyDefined => "Matcher defined twice",
            GrammarDefnErrorKind::LabelOutOfRange => "Label names an unknown matcher",
        };
        write!(f, "{} (matcher {})", s, self.midx)
    }
}

impl Error for GrammarDefnError {}

/// A grammar defect surfaced during matcher visitation at parse time (as opposed to one caught
/// when the grammar was built).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvalidGrammarError {
    midx: Option<usize>,
    reason: &'static str,
}

impl InvalidGrammarError {
    pub fn new(midx: Option<usize>, reason: &'static str) -> Self {
        InvalidGrammarError { midx, reason }
    }

    pub fn midx(&self) -> Option<usize> {
        self.midx
    }
}

impl fmt::Display for InvalidGrammarError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.midx {
            Some(m) => write!(f, "{} (matcher {})", self.reason, m),
            None => write!(f, "{}", self.reason),
        }
    }
}

impl Error for InvalidGrammarError {}

/// Builds a [`PegGrammar`](struct.PegGrammar.html) one matcher at a time. Recursive rules are
/// expressed by `reserve`ing a slot up front and `define`ing it once its children exist.
pub struct GrammarBuilder<StorageT> {
    matchers: Vec<Option<MatcherKind<StorageT>>>,
    labels: FnvHashMap<usize, String>,
    actions_len: usize,
}

impl<StorageT: 'static + PrimInt + Unsigned> GrammarBuilder<StorageT>
where
    usize: AsPrimitive<StorageT>,
{
    pub fn new() -> Self {
        GrammarBuilder {
            matchers: Vec::new(),
            labels: FnvHashMap::default(),
            actions_len: 0,
        }
    }

    fn add(&mut self, kind: MatcherKind<StorageT>) -> MIdx<StorageT> {
        let midx = MIdx::new(self.matchers.len());
        self.matchers.push(Some(kind));
        midx
    }

    /// Reserve a slot for a matcher which will be `define`d later. Matchers can reference the
    /// slot in the meantime, which is how recursive rules are tied.
    pub fn reserve(&mut self) -> MIdx<StorageT> {
        let midx = MIdx::new(self.matchers.len());
        self.matchers.push(None);
        midx
    }

    /// Fill in a previously `reserve`d slot.
    pub fn define(
        &mut self,
        midx: MIdx<StorageT>,
        kind: MatcherKind<StorageT>,
    ) -> Result<(), GrammarDefnError> {
        let i = usize::from(midx);
        if i >= self.matchers.len() {
            return Err(GrammarDefnError {
                kind: GrammarDefnErrorKind::ChildOutOfRange,
                midx: i,
            });
        }
        if self.matchers[i].is_some() {
            return Err(GrammarDefnError {
                kind: GrammarDefnErrorKind::AlreadyDefined,
                midx: i,
            });
        }
        self.matchers[i] = Some(kind);
        Ok(())
    }

    /// Attach a human-readable label to `midx`. Labelled matchers produce parse tree nodes and
    /// print by name in error paths.
    pub fn label(&mut self, midx: MIdx<StorageT>, name: &str) {
        self.labels.insert(usize::from(midx), name.to_owned());
    }

    pub fn ch(&mut self, c: char) -> MIdx<StorageT> {
        self.add(MatcherKind::Ch(c))
    }

    pub fn ch_range(&mut self, lo: char, hi: char) -> MIdx<StorageT> {
        self.add(MatcherKind::ChRange(lo, hi))
    }

    pub fn any_of(&mut self, cs: &str) -> MIdx<StorageT> {
        self.add(MatcherKind::AnyOf(cs.chars().collect()))
    }

    pub fn any(&mut self) -> MIdx<StorageT> {
        self.add(MatcherKind::Any)
    }

    pub fn eoi(&mut self) -> MIdx<StorageT> {
        self.add(MatcherKind::Eoi)
    }

    pub fn empty(&mut self) -> MIdx<StorageT> {
        self.add(MatcherKind::Empty)
    }

    pub fn nothing(&mut self) -> MIdx<StorageT> {
        self.add(MatcherKind::Nothing)
    }

    /// A string terminal: a labelled sequence of single-character matchers, so that
    /// single-character repair works inside it.
    pub fn string(&mut self, s: &str) -> MIdx<StorageT> {
        if s.is_empty() {
            return self.add(MatcherKind::Empty);
        }
        let children = s.chars().map(|c| self.ch(c)).collect::<Vec<_>>();
        let midx = self.add(MatcherKind::Seq(children));
        self.label(midx, s);
        midx
    }

    pub fn seq(&mut self, children: Vec<MIdx<StorageT>>) -> MIdx<StorageT> {
        self.add(MatcherKind::Seq(children))
    }

    pub fn first_of(&mut self, children: Vec<MIdx<StorageT>>) -> MIdx<StorageT> {
        self.add(MatcherKind::FirstOf(children))
    }

    pub fn one_or_more(&mut self, child: MIdx<StorageT>) -> MIdx<StorageT> {
        self.add(MatcherKind::OneOrMore(child))
    }

    pub fn zero_or_more(&mut self, child: MIdx<StorageT>) -> MIdx<StorageT> {
        self.add(MatcherKind::ZeroOrMore(child))
    }

    pub fn opt(&mut self, child: MIdx<StorageT>) -> MIdx<StorageT> {
        self.add(MatcherKind::Opt(child))
    }

    pub fn test(&mut self, child: MIdx<StorageT>) -> MIdx<StorageT> {
        self.add(MatcherKind::Test(child))
    }

    pub fn test_not(&mut self, child: MIdx<StorageT>) -> MIdx<StorageT> {
        self.add(MatcherKind::TestNot(child))
    }

    /// Allocate an action slot and the matcher that invokes it. The runtime is handed action
    /// functions in slot allocation order.
    pub fn action(&mut self) -> MIdx<StorageT> {
        let aidx = AIdx::new(self.actions_len);
        self.actions_len += 1;
        self.add(MatcherKind::Action(aidx))
    }

    /// Validate the arena and turn it into an immutable grammar rooted at `root`.
    pub fn finish(self, root: MIdx<StorageT>) -> Result<PegGrammar<StorageT>, GrammarDefnError> {
        let mut matchers = Vec::with_capacity(self.matchers.len());
        for (i, m) in self.matchers.into_iter().enumerate() {
            match m {
                Some(k) => matchers.push(k),
                None => {
                    return Err(GrammarDefnError {
                        kind: GrammarDefnErrorKind::UndefinedMatcher,
                        midx: i,
                    })
                }
            }
        }
        if usize::from(root) >= matchers.len() {
            return Err(GrammarDefnError {
                kind: GrammarDefnErrorKind::ChildOutOfRange,
                midx: usize::from(root),
            });
        }
        for (i, m) in matchers.iter().enumerate() {
            let defn_err = |kind| Err(GrammarDefnError { kind, midx: i });
            let in_range = |cs: &[MIdx<StorageT>]| {
                cs.iter().all(|c| usize::from(*c) < matchers.len())
            };
            match *m {
                MatcherKind::Seq(ref cs) | MatcherKind::FirstOf(ref cs) => {
                    if cs.is_empty() {
                        return defn_err(GrammarDefnErrorKind::EmptyCombinator);
                    }
                    if !in_range(cs) {
                        return defn_err(GrammarDefnErrorKind::ChildOutOfRange);
                    }
                }
                MatcherKind::OneOrMore(c)
                | MatcherKind::ZeroOrMore(c)
                | MatcherKind::Opt(c)
                | MatcherKind::Test(c)
                | MatcherKind::TestNot(c) => {
                    if usize::from(c) >= matchers.len() {
                        return defn_err(GrammarDefnErrorKind::ChildOutOfRange);
                    }
                }
                MatcherKind::Action(aidx) => {
                    if usize::from(aidx) >= self.actions_len {
                        return defn_err(GrammarDefnErrorKind::ActionOutOfRange);
                    }
                }
                MatcherKind::Ch(c) => {
                    if is_reserved_char(c) {
                        return defn_err(GrammarDefnErrorKind::ReservedChar(c));
                    }
                }
                MatcherKind::ChRange(lo, hi) => {
                    if is_reserved_char(lo) {
                        return defn_err(GrammarDefnErrorKind::ReservedChar(lo));
                    }
                    if is_reserved_char(hi) {
                        return defn_err(GrammarDefnErrorKind::ReservedChar(hi));
                    }
                }
                MatcherKind::AnyOf(ref cs) => {
                    if cs.is_empty() {
                        return defn_err(GrammarDefnErrorKind::EmptyMatchSet);
                    }
                    if let Some(c) = cs.iter().find(|c| is_reserved_char(**c)) {
                        return defn_err(GrammarDefnErrorKind::ReservedChar(*c));
                    }
                }
                MatcherKind::Any
                | MatcherKind::Empty
                | MatcherKind::Nothing
                | MatcherKind::Eoi => (),
            }
        }
        for (&i, _) in self.labels.iter() {
            if i >= matchers.len() {
                return Err(GrammarDefnError {
                    kind: GrammarDefnErrorKind::LabelOutOfRange,
                    midx: i,
                });
            }
        }

        let epsilon = epsilon::epsilons(&matchers);
        for (i, m) in matchers.iter().enumerate() {
            match *m {
                MatcherKind::OneOrMore(c) | MatcherKind::ZeroOrMore(c) => {
                    if epsilon[usize::from(c)] {
                        return Err(GrammarDefnError {
                            kind: GrammarDefnErrorKind::RepetitionMatchesEmpty,
                            midx: i,
                        });
                    }
                }
                _ => (),
            }
        }

        let mut labels = vec![None; matchers.len()];
        for (i, name) in self.labels.into_iter() {
            labels[i] = Some(name);
        }
        Ok(PegGrammar {
            matchers,
            labels,
            root,
            actions_len: self.actions_len,
            epsilon,
        })
    }
}

#[cfg(test)]
mod test {
    use super::{GrammarBuilder, GrammarDefnErrorKind, MatcherKind, PegGrammar};
    use idxnewtype::MIdx;

    fn abc_grammar() -> PegGrammar<u16> {
        let mut gb = GrammarBuilder::new();
        let a = gb.ch('a');
        let b = gb.ch('b');
        let c = gb.ch('c');
        let root = gb.seq(vec![a, b, c]);
        gb.label(root, "abc");
        gb.finish(root).unwrap()
    }

    #[test]
    fn test_build() {
        let grm = abc_grammar();
        assert_eq!(grm.matchers_len(), 4);
        assert_eq!(grm.actions_len(), 0);
        assert_eq!(grm.root(), MIdx(3u16));
        assert_eq!(grm.label(grm.root()), Some("abc"));
        assert_eq!(*grm.matcher(MIdx(0)), MatcherKind::Ch('a'));
        assert_eq!(grm.iter_midxs().count(), 4);
    }

    #[test]
    fn test_string_desugars_to_char_seq() {
        let mut gb = GrammarBuilder::<u16>::new();
        let s = gb.string("if");
        let grm = gb.finish(s).unwrap();
        assert_eq!(grm.label(s), Some("if"));
        match *grm.matcher(s) {
            MatcherKind::Seq(ref cs) => {
                assert_eq!(cs.len(), 2);
                assert_eq!(*grm.matcher(cs[0]), MatcherKind::Ch('i'));
                assert_eq!(*grm.matcher(cs[1]), MatcherKind::Ch('f'));
            }
            _ => panic!("string() did not build a sequence"),
        }
    }

    #[test]
    fn test_recursive_rule() {
        // expr: '(' expr ')' | 'x'
        let mut gb = GrammarBuilder::<u16>::new();
        let expr = gb.reserve();
        let lp = gb.ch('(');
        let rp = gb.ch(')');
        let x = gb.ch('x');
        let nested = gb.seq(vec![lp, expr, rp]);
        gb.define(expr, MatcherKind::FirstOf(vec![nested, x])).unwrap();
        let grm = gb.finish(expr).unwrap();
        assert!(!grm.matches_empty(expr));
    }

    #[test]
    fn test_undefined_slot() {
        let mut gb = GrammarBuilder::<u16>::new();
        let slot = gb.reserve();
        match gb.finish(slot) {
            Err(e) => assert_eq!(e.kind, GrammarDefnErrorKind::UndefinedMatcher),
            Ok(_) => panic!(),
        }
    }

    #[test]
    fn test_double_define() {
        let mut gb = GrammarBuilder::<u16>::new();
        let slot = gb.reserve();
        gb.define(slot, MatcherKind::Empty).unwrap();
        assert_eq!(
            gb.define(slot, MatcherKind::Any).unwrap_err().kind,
            GrammarDefnErrorKind::AlreadyDefined
        );
    }

    #[test]
    fn test_reserved_char_rejected() {
        let mut gb = GrammarBuilder::<u16>::new();
        let bad = gb.ch(::EOI);
        match gb.finish(bad) {
            Err(e) => assert_eq!(e.kind, GrammarDefnErrorKind::ReservedChar(::EOI)),
            Ok(_) => panic!(),
        }
    }

    #[test]
    fn test_nullable_repetition_rejected() {
        let mut gb = GrammarBuilder::<u16>::new();
        let a = gb.ch('a');
        let opt_a = gb.opt(a);
        let rep = gb.one_or_more(opt_a);
        match gb.finish(rep) {
            Err(e) => {
                assert_eq!(e.kind, GrammarDefnErrorKind::RepetitionMatchesEmpty);
                assert_eq!(e.midx, usize::from(rep));
            }
            Ok(_) => panic!(),
        }
    }

    #[test]
    fn test_empty_combinator_rejected() {
        let mut gb = GrammarBuilder::<u16>::new();
        let s = gb.seq(vec![]);
        assert_eq!(
            gb.finish(s).unwrap_err().kind,
            GrammarDefnErrorKind::EmptyCombinator
        );
    }
}
