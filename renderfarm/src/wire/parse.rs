//! Parsers for text argument lines
//! Uses library `nom`

use nom::{
    bytes::complete::take_till1,
    character::complete::{multispace0, multispace1},
    combinator::all_consuming,
    multi::separated_list0,
    number::complete::float,
    sequence::{delimited, tuple},
    IResult,
};

use crate::error::{FarmError, Result};

fn float_list(s: &str) -> IResult<&str, Vec<f32>> {
    delimited(
        multispace0,
        separated_list0(multispace1, float),
        multispace0,
    )(s)
}

fn token(s: &str) -> IResult<&str, &str> {
    take_till1(char::is_whitespace)(s)
}

/// Parse exactly `N` whitespace separated floats
///
/// Decimal and scientific notation are accepted.
pub fn parse_floats<const N: usize>(command: &'static str, line: &str) -> Result<[f32; N]> {
    let (_, values) = all_consuming(float_list)(line)
        .map_err(|e| FarmError::malformed(command, format!("not a float list ({e})")))?;

    let found = values.len();
    values
        .try_into()
        .map_err(|_| FarmError::malformed(command, format!("expected {N} floats, got {found}")))
}

/// Arguments of `luxMotionInstance`
#[derive(Debug, Clone, PartialEq)]
pub struct MotionArgs {
    pub name: String,
    pub start: f32,
    pub end: f32,
    pub to_transform: String,
}

fn motion_inner(s: &str) -> IResult<&str, MotionArgs> {
    let (s, (_, name, _, start, _, end, _, to_transform, _)) = tuple((
        multispace0,
        token,
        multispace1,
        float,
        multispace1,
        float,
        multispace1,
        token,
        multispace0,
    ))(s)?;

    Ok((
        s,
        MotionArgs {
            name: name.to_owned(),
            start,
            end,
            to_transform: to_transform.to_owned(),
        },
    ))
}

/// Parse line `name start end toTransform`
pub fn parse_motion_instance(line: &str) -> Result<MotionArgs> {
    all_consuming(motion_inner)(line)
        .map(|(_, args)| args)
        .map_err(|e| FarmError::malformed("luxMotionInstance", e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn three_floats() {
        let v: [f32; 3] = parse_floats("luxTranslate", "1 -2.5 3e2").unwrap();
        assert_eq!(v, [1.0, -2.5, 300.0]);
    }

    #[test]
    fn scientific_notation_and_padding() {
        let v: [f32; 2] = parse_floats("luxSetEpsilon", "  1.0000000000000000e-09\t5.0e+01 ").unwrap();
        assert_eq!(v, [1e-9, 50.0]);
    }

    #[test]
    fn wrong_count() {
        let res = parse_floats::<3>("luxScale", "1 2");
        assert!(matches!(res, Err(FarmError::MalformedArguments { .. })));
        let res = parse_floats::<3>("luxScale", "1 2 3 4");
        assert!(res.is_err());
    }

    #[test]
    fn garbage() {
        assert!(parse_floats::<1>("luxScale", "one").is_err());
        assert!(parse_floats::<2>("luxScale", "1 2x").is_err());
        assert!(parse_floats::<1>("luxScale", "").is_err());
    }

    #[test]
    fn sixteen_floats() {
        let line = (0..16).map(|i| format!("{:e}", i as f32)).collect::<Vec<_>>().join(" ");
        let v: [f32; 16] = parse_floats("luxTransform", &line).unwrap();
        assert_eq!(v[15], 15.0);
    }

    #[test]
    fn motion_instance() {
        let args = parse_motion_instance("wheel 0 1.5 spin_end").unwrap();
        assert_eq!(
            args,
            MotionArgs {
                name: "wheel".into(),
                start: 0.0,
                end: 1.5,
                to_transform: "spin_end".into(),
            }
        );

        assert!(parse_motion_instance("wheel 0 spin_end").is_err());
    }
}
