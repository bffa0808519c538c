// Agent catalog: one entry per agent page.
// Each agent is a form (required fields) in front of the shared poller; the
// probe says where that agent's result endpoint puts finished output.

pub mod handlers;
pub mod views;

use serde::Serialize;

use crate::config::AgentEndpoints;
use crate::poller::{JobSpec, ResultProbe};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct AgentSpec {
    pub slug: &'static str,
    pub title: &'static str,
    pub required_fields: &'static [&'static str],
    #[serde(skip)]
    pub probe: ResultProbe,
}

impl AgentSpec {
    pub fn job_spec<'a>(&'a self, endpoints: &'a AgentEndpoints) -> JobSpec<'a> {
        JobSpec {
            agent: self.slug,
            endpoints,
            required_fields: self.required_fields,
            probe: self.probe,
        }
    }
}

const NO_OUTPUT_YET: &str = "No output yet";

pub const AGENTS: &[AgentSpec] = &[
    AgentSpec {
        slug: "email-campaign",
        title: "Email Campaign Writer",
        required_fields: &["product", "audience", "goal"],
        probe: ResultProbe::field("output"),
    },
    AgentSpec {
        slug: "blog-writer",
        title: "Blog Writer",
        required_fields: &["topic", "keywords"],
        probe: ResultProbe::field("output"),
    },
    AgentSpec {
        slug: "interview-coach",
        title: "Interview Coach",
        required_fields: &["role", "company", "experience_level"],
        probe: ResultProbe::field("feedback"),
    },
    AgentSpec {
        slug: "seo-keywords",
        title: "SEO Keyword Analyzer",
        required_fields: &["website", "niche"],
        probe: ResultProbe::field("keywords").with_sentinel(NO_OUTPUT_YET),
    },
    AgentSpec {
        slug: "ad-generator",
        title: "Ad Generator",
        required_fields: &["product", "platform"],
        probe: ResultProbe::field("output"),
    },
    AgentSpec {
        slug: "persona-builder",
        title: "Persona Builder",
        required_fields: &["business", "target_market"],
        probe: ResultProbe::field("persona").with_sentinel(NO_OUTPUT_YET),
    },
    AgentSpec {
        slug: "linkedin-post",
        title: "LinkedIn Post Writer",
        required_fields: &["topic"],
        probe: ResultProbe::field("output"),
    },
    AgentSpec {
        slug: "cover-letter",
        title: "Cover Letter Writer",
        required_fields: &["job_title", "company", "resume_summary"],
        probe: ResultProbe::field("output").with_sentinel(NO_OUTPUT_YET),
    },
];

pub fn find_agent(slug: &str) -> Option<&'static AgentSpec> {
    AGENTS.iter().find(|agent| agent.slug == slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_slugs_are_unique() {
        let slugs: HashSet<_> = AGENTS.iter().map(|a| a.slug).collect();
        assert_eq!(slugs.len(), AGENTS.len());
    }

    #[test]
    fn test_every_agent_requires_something() {
        assert!(AGENTS.iter().all(|a| !a.required_fields.is_empty()));
    }

    #[test]
    fn test_find_agent() {
        assert_eq!(find_agent("seo-keywords").map(|a| a.title), Some("SEO Keyword Analyzer"));
        assert!(find_agent("unknown").is_none());
    }

    #[test]
    fn test_job_spec_carries_agent_settings() {
        let agent = find_agent("persona-builder").unwrap();
        let endpoints = AgentEndpoints {
            webhook_url: "http://w".to_string(),
            poll_url: "http://p".to_string(),
        };
        let spec = agent.job_spec(&endpoints);
        assert_eq!(spec.agent, "persona-builder");
        assert_eq!(spec.required_fields, &["business", "target_market"]);
        assert_eq!(spec.probe.pending_sentinel, Some(NO_OUTPUT_YET));
    }
}
