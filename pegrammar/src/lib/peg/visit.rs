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

//! The pure matcher analyses a recovering runtime is built from. None of these mutates the
//! grammar, and none requires extending the matcher types.

use std::hash::Hash;

use fnv::FnvHashSet;
use num_traits::{AsPrimitive, PrimInt, Unsigned};

use idxnewtype::{AIdx, MIdx};
use is_reserved_char;
use peg::{InvalidGrammarError, MatcherKind, PegGrammar};
use EOI;

/// Is `midx` a single-character terminal for repair purposes? `Test`/`TestNot` defer to their
/// child; `Eoi` is deliberately excluded (deleting or replacing "the end of input" is
/// meaningless). The wrapper chase is bounded by the arena size, so predicate cycles terminate.
pub fn is_single_char<StorageT: 'static + PrimInt + Unsigned>(
    grm: &PegGrammar<StorageT>,
    midx: MIdx<StorageT>,
) -> bool
where
    usize: AsPrimitive<StorageT>,
{
    let mut midx = midx;
    for _ in 0..grm.matchers_len() + 1 {
        match *grm.matcher(midx) {
            MatcherKind::Ch(_)
            | MatcherKind::ChRange(_, _)
            | MatcherKind::AnyOf(_)
            | MatcherKind::Any => return true,
            MatcherKind::Test(c) | MatcherKind::TestNot(c) => midx = c,
            _ => return false,
        }
    }
    false
}

/// The single character the terminal at `midx` can start with: `None` means "no canonical
/// character" (`Any`), which callers must treat as "nothing to insert". Asking for the starter
/// character of a compound matcher is a grammar defect.
pub fn starter_char<StorageT: 'static + PrimInt + Unsigned>(
    grm: &PegGrammar<StorageT>,
    midx: MIdx<StorageT>,
) -> Result<Option<char>, InvalidGrammarError>
where
    usize: AsPrimitive<StorageT>,
{
    let mut midx = midx;
    for _ in 0..grm.matchers_len() + 1 {
        match *grm.matcher(midx) {
            MatcherKind::Ch(c) => return Ok(Some(c)),
            MatcherKind::ChRange(lo, _) => return Ok(Some(lo)),
            MatcherKind::AnyOf(ref cs) => return Ok(Some(cs[0])),
            MatcherKind::Any => return Ok(None),
            MatcherKind::Eoi => return Ok(Some(EOI)),
            MatcherKind::Test(c) | MatcherKind::TestNot(c) => midx = c,
            _ => {
                return Err(InvalidGrammarError::new(
                    Some(usize::from(midx)),
                    "starter character requested for a compound matcher",
                ))
            }
        }
    }
    Err(InvalidGrammarError::new(
        None,
        "predicate cycle while computing a starter character",
    ))
}

/// Could the matcher at `midx` begin with the character `c`? Recursion through the grammar is
/// guarded by a path set, so index cycles answer `false` rather than looping.
pub fn is_starter_char<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &PegGrammar<StorageT>,
    midx: MIdx<StorageT>,
    c: char,
) -> bool
where
    usize: AsPrimitive<StorageT>,
{
    let mut path = FnvHashSet::default();
    starts_with(grm, midx, c, &mut path)
}

fn starts_with<StorageT: 'static + Hash + PrimInt + Unsigned>(
    grm: &PegGrammar<StorageT>,
    midx: MIdx<StorageT>,
    c: char,
    path: &mut FnvHashSet<MIdx<StorageT>>,
) -> bool
where
    usize: AsPrimitive<StorageT>,
{
    if !path.insert(midx) {
        return false;
    }
    let r = match *grm.matcher(midx) {
        MatcherKind::Ch(x) => x == c,
        MatcherKind::ChRange(lo, hi) => lo <= c && c <= hi,
        MatcherKind::AnyOf(ref cs) => cs.contains(&c),
        MatcherKind::Any => !is_reserved_char(c),
        MatcherKind::Eoi => c == EOI,
        MatcherKind::Seq(ref cs) => {
            let mut r = false;
            for &child in cs.iter() {
                if starts_with(grm, child, c, path) {
                    r = true;
                    break;
                }
                if !grm.matches_empty(child) {
                    break;
                }
            }
            r
        }
        MatcherKind::FirstOf(ref cs) => {
            cs.iter().any(|&child| starts_with(grm, child, c, path))
        }
        MatcherKind::OneOrMore(x)
        | MatcherKind::ZeroOrMore(x)
        | MatcherKind::Opt(x)
        | MatcherKind::Test(x) => starts_with(grm, x, c, path),
        MatcherKind::TestNot(_)
        | MatcherKind::Action(_)
        | MatcherKind::Empty
        | MatcherKind::Nothing => false,
    };
    path.remove(&midx);
    r
}

/// The minimal list of action slots that must be replayed to keep the value stack consistent when
/// the matcher at `midx` is skipped during resynchronisation. `None` means "no recoverable
/// actions here": a sequence propagates `None` from any child, and a sequence that (transitively)
/// contains itself also answers `None`, which a naive traversal would recurse into forever.
pub fn collect_resync_actions<StorageT: 'static + PrimInt + Unsigned>(
    grm: &PegGrammar<StorageT>,
    midx: MIdx<StorageT>,
) -> Option<Vec<AIdx<StorageT>>>
where
    usize: AsPrimitive<StorageT>,
{
    let mut path = Vec::new();
    collect(grm, midx, &mut path)
}

fn collect<StorageT: 'static + PrimInt + Unsigned>(
    grm: &PegGrammar<StorageT>,
    midx: MIdx<StorageT>,
    path: &mut Vec<MIdx<StorageT>>,
) -> Option<Vec<AIdx<StorageT>>>
where
    usize: AsPrimitive<StorageT>,
{
    match *grm.matcher(midx) {
        MatcherKind::Action(aidx) => Some(vec![aidx]),
        MatcherKind::OneOrMore(c) => collect(grm, c, path),
        MatcherKind::FirstOf(ref cs) => {
            for &c in cs.iter() {
                if let Some(v) = collect(grm, c, path) {
                    return Some(v);
                }
            }
            None
        }
        MatcherKind::Seq(ref cs) => {
            if path.contains(&midx) {
                return None;
            }
            path.push(midx);
            let mut out = Vec::new();
            let mut ok = true;
            for &c in cs.iter() {
                match collect(grm, c, path) {
                    Some(v) => out.extend(v),
                    None => {
                        ok = false;
                        break;
                    }
                }
            }
            path.pop();
            if ok {
                Some(out)
            } else {
                None
            }
        }
        _ => Some(Vec::new()),
    }
}

#[cfg(test)]
mod test {
    use super::{collect_resync_actions, is_single_char, is_starter_char, starter_char};
    use idxnewtype::AIdx;
    use peg::{GrammarBuilder, MatcherKind};
    use EOI;

    #[test]
    fn test_is_single_char() {
        let mut gb = GrammarBuilder::<u16>::new();
        let a = gb.ch('a');
        let rng = gb.ch_range('0', '9');
        let set = gb.any_of("+-");
        let any = gb.any();
        let eoi = gb.eoi();
        let t = gb.test(a);
        let tn = gb.test_not(rng);
        let s = gb.seq(vec![a, rng, set, any, eoi, t, tn]);
        let grm = gb.finish(s).unwrap();
        assert!(is_single_char(&grm, a));
        assert!(is_single_char(&grm, rng));
        assert!(is_single_char(&grm, set));
        assert!(is_single_char(&grm, any));
        assert!(is_single_char(&grm, t));
        assert!(is_single_char(&grm, tn));
        assert!(!is_single_char(&grm, eoi));
        assert!(!is_single_char(&grm, s));
    }

    #[test]
    fn test_starter_char() {
        let mut gb = GrammarBuilder::<u16>::new();
        let a = gb.ch('a');
        let rng = gb.ch_range('0', '9');
        let set = gb.any_of("+-");
        let any = gb.any();
        let eoi = gb.eoi();
        let s = gb.seq(vec![a, rng, set, any, eoi]);
        let grm = gb.finish(s).unwrap();
        assert_eq!(starter_char(&grm, a).unwrap(), Some('a'));
        assert_eq!(starter_char(&grm, rng).unwrap(), Some('0'));
        assert_eq!(starter_char(&grm, set).unwrap(), Some('+'));
        assert_eq!(starter_char(&grm, any).unwrap(), None);
        assert_eq!(starter_char(&grm, eoi).unwrap(), Some(EOI));
        assert!(starter_char(&grm, s).is_err());
    }

    #[test]
    fn test_is_starter_char() {
        // stmt: 'x'? 'y' 'z'
        let mut gb = GrammarBuilder::<u16>::new();
        let x = gb.ch('x');
        let opt_x = gb.opt(x);
        let y = gb.ch('y');
        let z = gb.ch('z');
        let stmt = gb.seq(vec![opt_x, y, z]);
        let grm = gb.finish(stmt).unwrap();
        assert!(is_starter_char(&grm, stmt, 'x'));
        assert!(is_starter_char(&grm, stmt, 'y'));
        assert!(!is_starter_char(&grm, stmt, 'z'));
    }

    #[test]
    fn test_is_starter_char_recursive() {
        // expr: '(' expr ')' | 'n'
        let mut gb = GrammarBuilder::<u16>::new();
        let expr = gb.reserve();
        let lp = gb.ch('(');
        let rp = gb.ch(')');
        let n = gb.ch('n');
        let nested = gb.seq(vec![lp, expr, rp]);
        gb.define(expr, MatcherKind::FirstOf(vec![nested, n])).unwrap();
        let grm = gb.finish(expr).unwrap();
        assert!(is_starter_char(&grm, expr, '('));
        assert!(is_starter_char(&grm, expr, 'n'));
        assert!(!is_starter_char(&grm, expr, ')'));
    }

    #[test]
    fn test_collect_actions() {
        let mut gb = GrammarBuilder::<u16>::new();
        let a = gb.ch('a');
        let act1 = gb.action();
        let act2 = gb.action();
        let inner = gb.seq(vec![a, act2]);
        let rep = gb.one_or_more(inner);
        let s = gb.seq(vec![act1, rep]);
        let grm = gb.finish(s).unwrap();
        assert_eq!(collect_resync_actions(&grm, a), Some(vec![]));
        assert_eq!(collect_resync_actions(&grm, act1), Some(vec![AIdx(0)]));
        assert_eq!(collect_resync_actions(&grm, rep), Some(vec![AIdx(1)]));
        assert_eq!(
            collect_resync_actions(&grm, s),
            Some(vec![AIdx(0), AIdx(1)])
        );
    }

    #[test]
    fn test_collect_actions_first_of() {
        let mut gb = GrammarBuilder::<u16>::new();
        let act = gb.action();
        let b = gb.ch('b');
        let alt = gb.seq(vec![b, act]);
        let c = gb.ch('c');
        let choice = gb.first_of(vec![alt, c]);
        let grm = gb.finish(choice).unwrap();
        // the first alternative's collection wins
        assert_eq!(collect_resync_actions(&grm, choice), Some(vec![AIdx(0)]));
    }

    #[test]
    fn test_collect_actions_cycle() {
        // expr: '(' expr ')' | 'n' — the nested sequence contains expr, which contains the
        // sequence again: the path stack must answer None rather than recurse forever.
        let mut gb = GrammarBuilder::<u16>::new();
        let expr = gb.reserve();
        let lp = gb.ch('(');
        let rp = gb.ch(')');
        let n = gb.ch('n');
        let nested = gb.seq(vec![lp, expr, rp]);
        gb.define(expr, MatcherKind::FirstOf(vec![nested, n])).unwrap();
        let grm = gb.finish(expr).unwrap();
        // nested -> expr -> FirstOf: first alternative cycles (None), second is the terminal 'n'
        // which contributes no actions, so the overall answer is Some(empty).
        assert_eq!(collect_resync_actions(&grm, nested), Some(vec![]));
    }

    #[test]
    fn test_collect_actions_cycle_without_escape() {
        let mut gb = GrammarBuilder::<u16>::new();
        let s = gb.reserve();
        let a = gb.ch('a');
        gb.define(s, MatcherKind::Seq(vec![s, a])).unwrap();
        let grm = gb.finish(s).unwrap();
        assert_eq!(collect_resync_actions(&grm, s), None);
    }
}
