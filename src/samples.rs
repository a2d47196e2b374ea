use num::NumCast;
use std::fmt;
use std::fmt::Formatter;

use crate::mseed_error::{MSResult, MSeedError};

/// Decoded data samples of a record or segment, tagged by sample type.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Text(Vec<u8>),
    Int32(Vec<i32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl Samples {
    /// New empty buffer of the given sample type tag.
    pub fn empty(sample_type: char) -> MSResult<Samples> {
        match sample_type {
            't' => Ok(Samples::Text(Vec::new())),
            'i' => Ok(Samples::Int32(Vec::new())),
            'f' => Ok(Samples::Float32(Vec::new())),
            'd' => Ok(Samples::Float64(Vec::new())),
            other => Err(MSeedError::Generic(format!(
                "unknown sample type `{}`",
                other
            ))),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Samples::Text(v) => v.len(),
            Samples::Int32(v) => v.len(),
            Samples::Float32(v) => v.len(),
            Samples::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sample type tag: `t`, `i`, `f` or `d`.
    pub fn sample_type(&self) -> char {
        match self {
            Samples::Text(_) => 't',
            Samples::Int32(_) => 'i',
            Samples::Float32(_) => 'f',
            Samples::Float64(_) => 'd',
        }
    }

    pub fn as_int32(&self) -> Option<&[i32]> {
        match self {
            Samples::Int32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float32(&self) -> Option<&[f32]> {
        match self {
            Samples::Float32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float64(&self) -> Option<&[f64]> {
        match self {
            Samples::Float64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&[u8]> {
        match self {
            Samples::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Appends `other` in place. The sample types must agree.
    pub fn append(&mut self, other: Samples) -> MSResult<()> {
        match (self, other) {
            (Samples::Text(a), Samples::Text(mut b)) => a.append(&mut b),
            (Samples::Int32(a), Samples::Int32(mut b)) => a.append(&mut b),
            (Samples::Float32(a), Samples::Float32(mut b)) => a.append(&mut b),
            (Samples::Float64(a), Samples::Float64(mut b)) => a.append(&mut b),
            (s, o) => {
                return Err(MSeedError::Generic(format!(
                    "sample type mismatch `{}` vs `{}`",
                    s.sample_type(),
                    o.sample_type()
                )))
            }
        }
        Ok(())
    }

    /// Prepends `other` in place. The sample types must agree.
    pub fn prepend(&mut self, other: Samples) -> MSResult<()> {
        fn splice<T>(a: &mut Vec<T>, mut b: Vec<T>) {
            std::mem::swap(a, &mut b);
            a.append(&mut b);
        }
        match (self, other) {
            (Samples::Text(a), Samples::Text(b)) => splice(a, b),
            (Samples::Int32(a), Samples::Int32(b)) => splice(a, b),
            (Samples::Float32(a), Samples::Float32(b)) => splice(a, b),
            (Samples::Float64(a), Samples::Float64(b)) => splice(a, b),
            (s, o) => {
                return Err(MSeedError::Generic(format!(
                    "sample type mismatch `{}` vs `{}`",
                    s.sample_type(),
                    o.sample_type()
                )))
            }
        }
        Ok(())
    }

    /// Removes and returns the first `n` samples.
    pub fn split_front(&mut self, n: usize) -> Samples {
        fn take<T>(v: &mut Vec<T>, n: usize) -> Vec<T> {
            let rest = v.split_off(n.min(v.len()));
            std::mem::replace(v, rest)
        }
        match self {
            Samples::Text(v) => Samples::Text(take(v, n)),
            Samples::Int32(v) => Samples::Int32(take(v, n)),
            Samples::Float32(v) => Samples::Float32(take(v, n)),
            Samples::Float64(v) => Samples::Float64(take(v, n)),
        }
    }

    /// Converts the buffer to another numeric sample type. Integer to float
    /// conversions are exact within range; float to integer conversions
    /// fail when a value cannot be represented.
    pub fn convert_to(&self, sample_type: char) -> MSResult<Samples> {
        if self.sample_type() == sample_type {
            return Ok(self.clone());
        }
        fn cast<A: NumCast + Copy, B: NumCast>(v: &[A]) -> MSResult<Vec<B>> {
            v.iter()
                .map(|x| {
                    NumCast::from(*x)
                        .ok_or_else(|| MSeedError::Generic(String::from("sample cast out of range")))
                })
                .collect()
        }
        match (self, sample_type) {
            (Samples::Int32(v), 'f') => Ok(Samples::Float32(cast(v)?)),
            (Samples::Int32(v), 'd') => Ok(Samples::Float64(cast(v)?)),
            (Samples::Float32(v), 'i') => Ok(Samples::Int32(cast(v)?)),
            (Samples::Float32(v), 'd') => Ok(Samples::Float64(cast(v)?)),
            (Samples::Float64(v), 'i') => Ok(Samples::Int32(cast(v)?)),
            (Samples::Float64(v), 'f') => Ok(Samples::Float32(cast(v)?)),
            (s, t) => Err(MSeedError::Generic(format!(
                "cannot convert sample type `{}` to `{}`",
                s.sample_type(),
                t
            ))),
        }
    }
}

impl fmt::Display for Samples {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Samples::Text(v) => write!(f, "Text, {} bytes", v.len()),
            Samples::Int32(v) => write!(f, "Int32, {} samples", v.len()),
            Samples::Float32(v) => write!(f, "Float32, {} samples", v.len()),
            Samples::Float64(v) => write!(f, "Float64, {} samples", v.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_same_type() {
        let mut a = Samples::Int32(vec![1, 2]);
        a.append(Samples::Int32(vec![3])).unwrap();
        assert_eq!(a.as_int32().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn append_mismatch() {
        let mut a = Samples::Int32(vec![1]);
        assert!(a.append(Samples::Float32(vec![1.0])).is_err());
    }

    #[test]
    fn prepend_order() {
        let mut a = Samples::Int32(vec![3, 4]);
        a.prepend(Samples::Int32(vec![1, 2])).unwrap();
        assert_eq!(a.as_int32().unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn split_front_takes_prefix() {
        let mut a = Samples::Int32(vec![1, 2, 3, 4, 5]);
        let head = a.split_front(2);
        assert_eq!(head.as_int32().unwrap(), &[1, 2]);
        assert_eq!(a.as_int32().unwrap(), &[3, 4, 5]);
        let all = a.split_front(100);
        assert_eq!(all.len(), 3);
        assert!(a.is_empty());
    }

    #[test]
    fn convert_int_to_double() {
        let a = Samples::Int32(vec![1, -2]);
        let d = a.convert_to('d').unwrap();
        assert_eq!(d.as_float64().unwrap(), &[1.0, -2.0]);
    }
}
