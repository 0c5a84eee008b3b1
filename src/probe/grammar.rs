//! Output grammars for the host ping tool
//!
//! Each platform family prints a different summary. A grammar holds two
//! independent extraction rules so a missing loss line never hides the
//! latency and vice versa.

use crate::network::PlatformFamily;
use once_cell::sync::Lazy;
use regex::Regex;

static WINDOWS_LOSS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new(r"(\d+(?:\.\d+)?)% loss").unwrap()]);

static WINDOWS_LATENCY: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new(r"Average = (\d+(?:\.\d+)?)ms").unwrap()]);

static UNIX_LOSS: Lazy<Vec<Regex>> =
    Lazy::new(|| vec![Regex::new(r"(\d+(?:\.\d+)?)% packet loss").unwrap()]);

// iputils and BSD print "rtt min/avg/max/mdev = a/b/c/d ms" or
// "round-trip min/avg/max/stddev = ..."; busybox prints the same without the
// fourth column. Some builds print a plain "avg = N".
static UNIX_LATENCY: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"avg = ([\d.]+)").unwrap(),
        Regex::new(r"min/avg/max(?:/(?:mdev|stddev))? = [\d.]+/([\d.]+)/").unwrap(),
    ]
});

/// Summary dialect of a platform family's ping output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputGrammar {
    /// "(0% loss)" and "Average = 12ms"
    Windows,
    /// "0% packet loss" and "avg = 0.05" / "min/avg/max = ..."
    Unix,
}

/// Values pulled from one ping summary
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PingSummary {
    pub packet_loss_percent: Option<f64>,
    pub avg_latency_ms: Option<f64>,
}

impl OutputGrammar {
    pub fn for_platform(platform: PlatformFamily) -> Self {
        match platform {
            PlatformFamily::Windows => OutputGrammar::Windows,
            PlatformFamily::Unix => OutputGrammar::Unix,
        }
    }

    fn loss_rule(&self) -> &'static [Regex] {
        match self {
            OutputGrammar::Windows => &WINDOWS_LOSS,
            OutputGrammar::Unix => &UNIX_LOSS,
        }
    }

    fn latency_rule(&self) -> &'static [Regex] {
        match self {
            OutputGrammar::Windows => &WINDOWS_LATENCY,
            OutputGrammar::Unix => &UNIX_LATENCY,
        }
    }

    pub fn packet_loss(&self, output: &str) -> Option<f64> {
        first_capture(self.loss_rule(), output)
    }

    pub fn avg_latency(&self, output: &str) -> Option<f64> {
        first_capture(self.latency_rule(), output)
    }

    pub fn parse(&self, output: &str) -> PingSummary {
        PingSummary {
            packet_loss_percent: self.packet_loss(output),
            avg_latency_ms: self.avg_latency(output),
        }
    }
}

fn first_capture(rule: &[Regex], output: &str) -> Option<f64> {
    rule.iter()
        .filter_map(|re| re.captures(output))
        .filter_map(|caps| caps.get(1))
        .find_map(|m| m.as_str().parse::<f64>().ok())
}
