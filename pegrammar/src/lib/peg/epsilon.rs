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

use num_traits::{PrimInt, Unsigned};
use vob::Vob;

use peg::MatcherKind;

/// Compute, for every matcher in the arena, whether it can succeed without consuming input. Our
/// implementation is a simple fixpoint: predicates, actions, `Empty`, `Eoi` and the optional
/// combinators are nullable outright; a sequence is nullable once all its children are; an
/// ordered choice once any child is; a `OneOrMore` once its body is. Cycles need no special
/// handling because bits only ever flip from false to true.
pub(crate) fn epsilons<StorageT: PrimInt + Unsigned>(matchers: &[MatcherKind<StorageT>]) -> Vob {
    let mut eps = Vob::new();
    eps.resize(matchers.len(), false);
    loop {
        let mut changed = false;
        for (i, m) in matchers.iter().enumerate() {
            if eps[i] {
                continue;
            }
            let e = match *m {
                MatcherKind::Empty
                | MatcherKind::Eoi
                | MatcherKind::Action(_)
                | MatcherKind::Opt(_)
                | MatcherKind::ZeroOrMore(_)
                | MatcherKind::Test(_)
                | MatcherKind::TestNot(_) => true,
                MatcherKind::OneOrMore(c) => eps[usize::from(c)],
                MatcherKind::Seq(ref cs) => cs.iter().all(|c| eps[usize::from(*c)]),
                MatcherKind::FirstOf(ref cs) => cs.iter().any(|c| eps[usize::from(*c)]),
                MatcherKind::Nothing
                | MatcherKind::Ch(_)
                | MatcherKind::ChRange(_, _)
                | MatcherKind::AnyOf(_)
                | MatcherKind::Any => false,
            };
            if e {
                eps.set(i, true);
                changed = true;
            }
        }
        if !changed {
            return eps;
        }
    }
}

#[cfg(test)]
mod test {
    use peg::{GrammarBuilder, PegGrammar};
    use idxnewtype::MIdx;

    fn has(grm: &PegGrammar<u16>, midx: MIdx<u16>, should_be: bool) {
        if grm.matches_empty(midx) != should_be {
            panic!(
                "matcher {} nullability is {}, expected {}",
                usize::from(midx),
                grm.matches_empty(midx),
                should_be
            );
        }
    }

    #[test]
    fn test_epsilon_basics() {
        let mut gb = GrammarBuilder::new();
        let a = gb.ch('a');
        let opt_a = gb.opt(a);
        let b = gb.ch('b');
        let ab = gb.seq(vec![opt_a, b]);
        let opt_b = gb.opt(b);
        let nullable_seq = gb.seq(vec![opt_a, opt_b]);
        let choice = gb.first_of(vec![ab, opt_b]);
        let root = gb.seq(vec![ab, choice, nullable_seq]);
        let grm = gb.finish(root).unwrap();
        has(&grm, a, false);
        has(&grm, opt_a, true);
        has(&grm, ab, false);
        has(&grm, nullable_seq, true);
        has(&grm, choice, true);
        has(&grm, root, false);
    }

    #[test]
    fn test_epsilon_recursion() {
        // list: item list | ; item: 'x' — nullable through the empty alternative
        let mut gb = GrammarBuilder::new();
        let list = gb.reserve();
        let x = gb.ch('x');
        let cons = gb.seq(vec![x, list]);
        let nil = gb.empty();
        gb.define(list, ::peg::MatcherKind::FirstOf(vec![cons, nil]))
            .unwrap();
        let grm = gb.finish(list).unwrap();
        has(&grm, list, true);
        has(&grm, cons, false);
    }

    #[test]
    fn test_one_or_more_of_nullable_choice() {
        let mut gb = GrammarBuilder::<u16>::new();
        let a = gb.ch('a');
        let e = gb.empty();
        let choice = gb.first_of(vec![a, e]);
        let rep = gb.one_or_more(choice);
        // nullable repetition bodies are rejected at construction time
        assert!(gb.finish(rep).is_err());
    }
}
