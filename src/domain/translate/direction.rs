//! Translation directions and their static instruction texts

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Key used whenever a direction has to be assumed
pub const DEFAULT_DIRECTION: &str = "dev_to_pm";

/// Closed set of translation directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Technical write-up rephrased for a product manager
    #[default]
    DevToPm,
    /// Product requirement rephrased for an engineer
    PmToDev,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::DevToPm, Direction::PmToDev];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DevToPm => "dev_to_pm",
            Self::PmToDev => "pm_to_dev",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::DevToPm => DEV_TO_PM_SYSTEM_PROMPT,
            Self::PmToDev => PM_TO_DEV_SYSTEM_PROMPT,
        }
    }

    pub fn gap_analysis_prompt(&self) -> &'static str {
        match self {
            Self::DevToPm => DEV_TO_PM_GAP_PROMPT,
            Self::PmToDev => PM_TO_DEV_GAP_PROMPT,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dev_to_pm" => Ok(Self::DevToPm),
            "pm_to_dev" => Ok(Self::PmToDev),
            other => Err(DomainError::validation(format!(
                "Unknown translation direction '{}', expected one of: dev_to_pm, pm_to_dev",
                other
            ))),
        }
    }
}

/// Static system-prompt lookup; unknown keys use the default direction's text
pub fn system_prompt_for(direction: &str) -> &'static str {
    direction
        .parse::<Direction>()
        .unwrap_or_default()
        .system_prompt()
}

/// Static gap-analysis instruction lookup, same fallback as `system_prompt_for`
pub fn gap_analysis_prompt_for(direction: &str) -> &'static str {
    direction
        .parse::<Direction>()
        .unwrap_or_default()
        .gap_analysis_prompt()
}

const DEV_TO_PM_SYSTEM_PROMPT: &str = "You translate engineering language into product language. \
Rewrite the technical content so that a product manager understands what changes for users, \
what the business impact is, which risks exist and what decisions are needed. \
Avoid implementation jargon; when a technical term is unavoidable, explain it in one sentence. \
Keep every fact from the source and do not invent numbers or commitments.";

const PM_TO_DEV_SYSTEM_PROMPT: &str = "You translate product language into engineering language. \
Rewrite the product requirement so that an engineer can plan the work: \
state the functional scope, inputs and outputs, data involved, edge cases, \
non-functional expectations and open questions. \
Keep every fact from the source and mark assumptions explicitly.";

const DEV_TO_PM_GAP_PROMPT: &str = "You review technical content before it is explained to a product manager. \
List the information a product manager would need that the content does not provide \
(user impact, timeline, cost, risk, dependencies). \
Reply with a JSON object only: \
{\"gaps\": [{\"category\": string, \"description\": string, \"importance\": \"high\"|\"medium\"|\"low\"}], \
\"suggestions\": [string]}.";

const PM_TO_DEV_GAP_PROMPT: &str = "You review a product requirement before it is handed to engineers. \
List the information an engineer would need that the requirement does not provide \
(acceptance criteria, data sources, performance targets, error handling, scope limits). \
Reply with a JSON object only: \
{\"gaps\": [{\"category\": string, \"description\": string, \"importance\": \"high\"|\"medium\"|\"low\"}], \
\"suggestions\": [string]}.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_directions() {
        assert_eq!("dev_to_pm".parse::<Direction>().unwrap(), Direction::DevToPm);
        assert_eq!("pm_to_dev".parse::<Direction>().unwrap(), Direction::PmToDev);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_round_trip_keys() {
        for direction in Direction::ALL {
            assert_eq!(direction.as_str().parse::<Direction>().unwrap(), direction);
        }
    }

    #[test]
    fn test_unknown_key_falls_back_to_default_prompt() {
        assert_eq!(system_prompt_for("unknown"), Direction::DevToPm.system_prompt());
        assert_eq!(system_prompt_for("pm_to_dev"), Direction::PmToDev.system_prompt());
        assert_eq!(DEFAULT_DIRECTION, Direction::default().as_str());
    }
}
