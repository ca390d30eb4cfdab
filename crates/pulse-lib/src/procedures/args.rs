//! Parsing helpers for the string arguments procedures receive.

use crate::{
    detectors::adaptive::AdaptiveThresholdConfig,
    error::{Error, Result},
    procedures::RawArguments,
};

fn raw<'a>(args: &'a RawArguments, name: &str) -> Result<&'a str> {
    args.get(name)
        .map(|s| s.trim())
        .ok_or_else(|| Error::invalid_argument(name, "missing value"))
}

pub fn parse_f64(args: &RawArguments, name: &str) -> Result<f64> {
    let text = raw(args, name)?;
    let value: f64 = text
        .parse()
        .map_err(|_| Error::invalid_argument(name, format!("'{text}' is not a number")))?;
    if !value.is_finite() {
        return Err(Error::invalid_argument(name, format!("'{text}' is not finite")));
    }
    Ok(value)
}

pub fn parse_positive(args: &RawArguments, name: &str) -> Result<f64> {
    let value = parse_f64(args, name)?;
    if value <= 0.0 {
        return Err(Error::invalid_argument(name, format!("must be positive, got {value}")));
    }
    Ok(value)
}

pub fn parse_usize(args: &RawArguments, name: &str) -> Result<usize> {
    let text = raw(args, name)?;
    text.parse()
        .map_err(|_| Error::invalid_argument(name, format!("'{text}' is not a non-negative integer")))
}

/// Overlay the threshold tunables found in `args` onto `base` and validate the result.
pub fn parse_threshold(args: &RawArguments, base: AdaptiveThresholdConfig) -> Result<AdaptiveThresholdConfig> {
    let mut cfg = base;
    if args.contains_key("threshold_fraction") {
        cfg.threshold_fraction = parse_f64(args, "threshold_fraction")?;
    }
    if args.contains_key("threshold_period") {
        cfg.threshold_period_s = parse_f64(args, "threshold_period")?;
    }
    if args.contains_key("safe_period") {
        cfg.safe_period_s = parse_f64(args, "safe_period")?;
    }
    if args.contains_key("stall_factor") {
        cfg.stall_factor = parse_f64(args, "stall_factor")?;
    }
    if args.contains_key("decay_factor") {
        cfg.decay_factor = parse_f64(args, "decay_factor")?;
    }
    if args.contains_key("max_widenings") {
        let widenings = parse_usize(args, "max_widenings")?;
        cfg.max_widenings = u32::try_from(widenings)
            .map_err(|_| Error::invalid_argument("max_widenings", format!("{widenings} is too large")))?;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// String form of the threshold tunables of `cfg`, in argument-name order.
pub fn threshold_defaults(cfg: &AdaptiveThresholdConfig) -> [(&'static str, String); 6] {
    [
        ("threshold_fraction", cfg.threshold_fraction.to_string()),
        ("threshold_period", cfg.threshold_period_s.to_string()),
        ("safe_period", cfg.safe_period_s.to_string()),
        ("stall_factor", cfg.stall_factor.to_string()),
        ("decay_factor", cfg.decay_factor.to_string()),
        ("max_widenings", cfg.max_widenings.to_string()),
    ]
}
