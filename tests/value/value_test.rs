//! Human-readable literals, standalone and inside expressions.

use tally::expr::{parse, Expr, Literal};
use tally::value::{HumanDuration, HumanSize, Percentage, UnitSystem, ValueError};

#[test]
fn test_binary_size() {
    assert_eq!(HumanSize::parse("1MiB").unwrap().value(), 1_048_576);
    assert_eq!(
        HumanSize::format(1_048_576, 0, UnitSystem::Binary).unwrap(),
        "1MiB"
    );
}

#[test]
fn test_percentage_fraction() {
    assert_eq!(Percentage::parse("50%").unwrap().fraction(), 0.5);
    assert!(Percentage::parse("50").is_err());
}

#[test]
fn test_duration_round_trip() {
    let hour = HumanDuration::parse("1h").unwrap();
    assert_eq!(hour.seconds(), 3600);
    assert_eq!(hour.to_string(), "1h");
    assert_eq!(hour, HumanDuration::parse("60m").unwrap());
}

#[test]
fn test_parse_errors_are_format_errors() {
    for text in ["", "h", "1.5h", "1w"] {
        assert!(
            matches!(HumanDuration::parse(text), Err(ValueError::Format { .. })),
            "{text:?}"
        );
    }
}

#[test]
fn test_literals_inside_expressions() {
    let Expr::Binary { right, .. } = parse("heapUsed > 512MiB").unwrap() else {
        panic!("expected a comparison");
    };
    match *right {
        Expr::Literal(Literal::Size(size)) => assert_eq!(size.value(), 512 << 20),
        other => panic!("unexpected {other:?}"),
    }

    assert_eq!(parse("t > 60s").unwrap(), parse("t > 1m").unwrap());
    assert_ne!(parse("t > 60s").unwrap(), parse("t > 2m").unwrap());
}

#[test]
fn test_serde_uses_text_form() {
    let d: HumanDuration = serde_json::from_str("\"5m\"").unwrap();
    assert_eq!(d.seconds(), 300);
    assert!(serde_json::from_str::<HumanDuration>("\"5x\"").is_err());
}
