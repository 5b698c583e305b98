//! Declarative implementations of `NetworkValue` for application types.

/// Implements [`NetworkValue`](crate::NetworkValue) for a field-less enum.
///
/// The enum must be `Clone + PartialEq`. Discriminants travel as `$repr`;
/// unknown discriminants decode to `CodecError::InvalidEnumValue`.
///
/// ```
/// use codec::impl_network_enum;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum Team {
///     Red = 1,
///     Blue = 2,
/// }
///
/// impl_network_enum!(Team as u8 { Red, Blue });
/// ```
#[macro_export]
macro_rules! impl_network_enum {
    ($ty:ty as $repr:ty { $($variant:ident),+ $(,)? }) => {
        impl $crate::NetworkValue for $ty {
            fn kind() -> $crate::ValueKind {
                $crate::ValueKind::Enum {
                    bits: (::std::mem::size_of::<$repr>() * 8) as u8,
                }
            }

            fn write(&self, writer: &mut $crate::BufferWriter) -> $crate::CodecResult<()> {
                writer.write_value(::std::clone::Clone::clone(self) as $repr)?;
                Ok(())
            }

            fn read(
                reader: &mut $crate::BufferReader<'_>,
                _ctx: &mut $crate::DecodeContext,
            ) -> $crate::CodecResult<Self> {
                let raw: $repr = reader.read_value()?;
                $(
                    if raw == <$ty>::$variant as $repr {
                        return Ok(<$ty>::$variant);
                    }
                )+
                Err($crate::CodecError::InvalidEnumValue {
                    type_name: stringify!($ty),
                    value: raw as i128,
                })
            }
        }
    };
}

/// Implements [`NetworkValue`](crate::NetworkValue) for a plain struct, field
/// by field.
///
/// Deltas start with one change bit per field, followed by nested deltas of
/// the changed fields only.
///
/// ```
/// use codec::{impl_network_struct, FixedString};
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Profile {
///     level: u16,
///     name: FixedString<16>,
///     scores: Vec<u32>,
/// }
///
/// impl_network_struct!(Profile {
///     level: u16,
///     name: FixedString<16>,
///     scores: Vec<u32>,
/// });
/// ```
#[macro_export]
macro_rules! impl_network_struct {
    ($ty:ident { $($field:ident : $fty:ty),+ $(,)? }) => {
        impl $crate::NetworkValue for $ty {
            fn kind() -> $crate::ValueKind {
                $crate::ValueKind::Struct(vec![$(<$fty as $crate::NetworkValue>::kind()),+])
            }

            fn write(&self, writer: &mut $crate::BufferWriter) -> $crate::CodecResult<()> {
                $( $crate::NetworkValue::write(&self.$field, writer)?; )+
                Ok(())
            }

            fn read(
                reader: &mut $crate::BufferReader<'_>,
                ctx: &mut $crate::DecodeContext,
            ) -> $crate::CodecResult<Self> {
                Ok(Self {
                    $( $field: <$fty as $crate::NetworkValue>::read(reader, ctx)?, )+
                })
            }

            fn read_in_place(
                &mut self,
                reader: &mut $crate::BufferReader<'_>,
                ctx: &mut $crate::DecodeContext,
            ) -> $crate::CodecResult<()> {
                $( $crate::NetworkValue::read_in_place(&mut self.$field, reader, ctx)?; )+
                Ok(())
            }

            fn write_delta(
                &self,
                previous: &Self,
                writer: &mut $crate::BufferWriter,
            ) -> $crate::CodecResult<()> {
                let changed = [$(
                    !$crate::NetworkValue::are_equal(&self.$field, &previous.$field)
                ),+];
                {
                    let mut bits = writer.enter_bitwise();
                    for flag in changed {
                        bits.write_bit(flag)?;
                    }
                }
                let mut flags = changed.into_iter();
                $(
                    if flags.next().unwrap_or(false) {
                        $crate::NetworkValue::write_delta(&self.$field, &previous.$field, writer)?;
                    }
                )+
                Ok(())
            }

            fn read_delta(
                &mut self,
                reader: &mut $crate::BufferReader<'_>,
                ctx: &mut $crate::DecodeContext,
            ) -> $crate::CodecResult<()> {
                let field_count = [$(stringify!($field)),+].len();
                let mut changed = Vec::with_capacity(field_count);
                {
                    let mut bits = reader.enter_bitwise();
                    for _ in 0..field_count {
                        changed.push(bits.read_bit()?);
                    }
                }
                let mut flags = changed.into_iter();
                $(
                    if flags.next().unwrap_or(false) {
                        $crate::NetworkValue::read_delta(&mut self.$field, reader, ctx)?;
                    }
                )+
                Ok(())
            }

            fn are_equal(&self, other: &Self) -> bool {
                true $(&& $crate::NetworkValue::are_equal(&self.$field, &other.$field))+
            }

            fn duplicate(&self) -> Self {
                Self {
                    $( $field: $crate::NetworkValue::duplicate(&self.$field), )+
                }
            }
        }
    };
}
