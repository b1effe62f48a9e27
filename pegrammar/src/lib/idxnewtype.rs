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

use std::mem::size_of;

use num_traits::{cast, AsPrimitive, PrimInt, Unsigned};

// The newtypes below are what one might call pure index newtypes: they exist only so that a
// matcher index cannot silently be used where an action index is expected (or vice versa). The
// StorageT inside is expected to be an unsigned integer no wider than usize, which the From
// impls debug-check.

macro_rules! idx_newtype {
    ($(#[$attr:meta])* $n: ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        pub struct $n<StorageT>(pub StorageT);

        impl<StorageT: PrimInt + Unsigned> From<$n<StorageT>> for usize {
            fn from(x: $n<StorageT>) -> Self {
                debug_assert!(size_of::<usize>() >= size_of::<StorageT>());
                cast(x.0).unwrap()
            }
        }

        impl<StorageT: 'static + PrimInt + Unsigned> $n<StorageT>
        where usize: AsPrimitive<StorageT>
        {
            pub fn new(x: usize) -> Self {
                debug_assert!(cast::<StorageT, usize>(StorageT::max_value()).map_or(true, |m| x <= m));
                $n(x.as_())
            }
        }
    }
}

idx_newtype!(
    /// A type specifically for matcher indices.
    MIdx
);
idx_newtype!(
    /// A type specifically for action slot indices.
    AIdx
);

#[cfg(test)]
mod test {
    use super::{AIdx, MIdx};

    #[test]
    fn test_round_trip() {
        assert_eq!(usize::from(MIdx::<u16>::new(7)), 7);
        assert_eq!(usize::from(AIdx::<u32>::new(0)), 0);
        assert_eq!(MIdx::<u8>::new(255), MIdx(255u8));
    }
}
