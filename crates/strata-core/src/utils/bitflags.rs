// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Declares a transparent bit-set type with named constants.
///
/// The generated type supports `|`, `|=`, `contains` and raw bit access. It is
/// used for usage masks and barrier scopes across the renderer API.
#[macro_export]
macro_rules! strata_bitflags {
    (
        $(#[$outer:meta])*
        $vis:vis struct $name:ident: $ty:ty {
            $(
                $(#[$inner:meta])*
                const $flag:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        $vis struct $name {
            bits: $ty,
        }

        impl $name {
            $(
                $(#[$inner])*
                pub const $flag: Self = Self { bits: $value };
            )*

            /// Returns a set with no flags.
            pub const fn empty() -> Self {
                Self { bits: 0 }
            }

            /// Returns the raw bits.
            pub const fn bits(&self) -> $ty {
                self.bits
            }

            /// Builds a set from raw bits, keeping every bit as-is.
            pub const fn from_bits_retain(bits: $ty) -> Self {
                Self { bits }
            }

            /// Returns `true` if every flag of `other` is also set in `self`.
            pub const fn contains(&self, other: Self) -> bool {
                (self.bits & other.bits) == other.bits
            }

            /// Returns `true` if at least one flag of `other` is set in `self`.
            pub const fn intersects(&self, other: Self) -> bool {
                (self.bits & other.bits) != 0
            }

            /// Returns `true` if no flag is set.
            pub const fn is_empty(&self) -> bool {
                self.bits == 0
            }

            /// Returns the union of both sets.
            pub const fn union(self, other: Self) -> Self {
                Self {
                    bits: self.bits | other.bits,
                }
            }
        }

        impl ::std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self::Output {
                self.union(rhs)
            }
        }

        impl ::std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.bits |= rhs.bits;
            }
        }
    };
}

#[cfg(test)]
mod tests {
    crate::strata_bitflags! {
        /// Test flags.
        pub struct Probe: u32 {
            /// A.
            const A = 1 << 0;
            /// B.
            const B = 1 << 1;
        }
    }

    #[test]
    fn union_and_contains() {
        let ab = Probe::A | Probe::B;
        assert!(ab.contains(Probe::A));
        assert!(ab.contains(Probe::A | Probe::B));
        assert!(!Probe::A.contains(Probe::B));
        assert!(Probe::A.intersects(ab));
        assert!(Probe::empty().is_empty());
        assert_eq!(ab.bits(), 0b11);
    }
}
