//! Text rendering of published values.

use core::fmt::Write;

use heapless::String;

/// Room for any integer and for floats of ordinary magnitude.
const NUMBER_LEN: usize = 32;

/// A published value in text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload<'a> {
    Text(&'a str),
    Number(String<NUMBER_LEN>),
}

impl Payload<'_> {
    pub fn as_str(&self) -> &str {
        match self {
            Payload::Text(text) => *text,
            Payload::Number(number) => number.as_str(),
        }
    }
}

/// Values accepted by `put` and `put_retain`.
///
/// Strings are sent as is, integers in decimal and floats with two decimal
/// places (`21.5` is sent as `"21.50"`).
pub trait IntoPayload<'a> {
    fn into_payload(self) -> Payload<'a>;
}

impl<'a> IntoPayload<'a> for &'a str {
    fn into_payload(self) -> Payload<'a> {
        Payload::Text(self)
    }
}

fn render(args: core::fmt::Arguments<'_>) -> Payload<'static> {
    let mut number = String::new();
    // Integers always fit.
    let _ = number.write_fmt(args);
    Payload::Number(number)
}

fn render_float(value: f64) -> Payload<'static> {
    let mut number = String::<NUMBER_LEN>::new();
    if write!(number, "{:.2}", value).is_err() {
        // Too large for fixed notation.
        number.clear();
        let _ = write!(number, "{:e}", value);
    }
    Payload::Number(number)
}

macro_rules! integer_payload {
    ($($ty:ty),*) => {
        $(
            impl IntoPayload<'static> for $ty {
                fn into_payload(self) -> Payload<'static> {
                    render(format_args!("{}", self))
                }
            }
        )*
    };
}

integer_payload!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

impl IntoPayload<'static> for f32 {
    fn into_payload(self) -> Payload<'static> {
        render_float(f64::from(self))
    }
}

impl IntoPayload<'static> for f64 {
    fn into_payload(self) -> Payload<'static> {
        render_float(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_render_as_text() {
        assert_eq!((-42i32).into_payload().as_str(), "-42");
        assert_eq!(u64::MAX.into_payload().as_str(), "18446744073709551615");
        assert_eq!(21.5f32.into_payload().as_str(), "21.50");
        assert_eq!(19.999f64.into_payload().as_str(), "20.00");
        assert_eq!(f64::MAX.into_payload().as_str(), "1.7976931348623157e308");
    }

    #[test]
    fn text_is_borrowed() {
        assert_eq!("on".into_payload(), Payload::Text("on"));
    }
}
