//! The fixed document corpus: identity and security standards grouped by
//! topic. Locations are either local PDF paths or public URLs.

/// A document location tagged with the topic it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    pub topic: String,
    pub location: String,
}

impl Source {
    pub fn new(topic: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            location: location.into(),
        }
    }
}

struct TopicEntry {
    name: &'static str,
    locations: &'static [&'static str],
}

const NIST_DOCS: &[&str] = &[
    "./pdf_docs/NIST.SP.800-37r2.pdf",
    "./pdf_docs/NIST.SP.800-63A-4.ipd.pdf",
    "./pdf_docs/NIST.SP.800-63C-4.ipd.pdf",
    "./pdf_docs/NIST.SP.800-63-4.ipd.pdf",
    "./pdf_docs/NIST.SP.800-63B-4.ipd.pdf",
    "./pdf_docs/NIST.IR.8062.pdf",
];

const TOPICS: &[TopicEntry] = &[
    TopicEntry {
        name: "ENISA",
        locations: &[
            "./pdf_docs/ENISA Report - Data Protection Engineering.pdf",
            "./pdf_docs/ENISA Threat Landscape 2022.pdf",
        ],
    },
    TopicEntry {
        name: "NIST",
        locations: NIST_DOCS,
    },
    TopicEntry {
        name: "NISTSP80063",
        locations: NIST_DOCS,
    },
    TopicEntry {
        name: "OAUTH",
        locations: &[
            "https://www.ietf.org/archive/id/draft-ietf-oauth-dpop-16.html",
            "https://www.ietf.org/archive/id/draft-ietf-oauth-step-up-authn-challenge-15.html",
            "https://www.ietf.org/archive/id/draft-ietf-oauth-selective-disclosure-jwt-04.html",
            "https://www.ietf.org/archive/id/draft-ietf-oauth-browser-based-apps-13.html",
            "https://www.ietf.org/archive/id/draft-ietf-oauth-cross-device-security-01.html",
            "https://www.ietf.org/archive/id/draft-ietf-oauth-security-topics-22.html",
            "https://www.ietf.org/archive/id/draft-ietf-oauth-v2-1-08.html",
            "https://www.ietf.org/archive/id/draft-ietf-oauth-rar-23.html",
            "https://www.ietf.org/archive/id/draft-ietf-oauth-jwt-introspection-response-12.html",
            "https://www.ietf.org/archive/id/draft-ietf-oauth-step-up-authn-challenge-13.html",
            "https://www.rfc-editor.org/rfc/rfc9126.html",
            "https://www.rfc-editor.org/rfc/rfc8705.html",
            "https://www.rfc-editor.org/rfc/rfc8707.html",
            "https://www.rfc-editor.org/rfc/rfc8693.html",
            "https://www.rfc-editor.org/rfc/rfc8628.html",
            "https://www.rfc-editor.org/rfc/rfc8252.html",
            "https://www.rfc-editor.org/rfc/rfc7662.html",
            "https://www.rfc-editor.org/rfc/rfc7009.html",
            "https://www.rfc-editor.org/rfc/rfc6819.html",
            "https://www.rfc-editor.org/rfc/rfc6749.html",
        ],
    },
    TopicEntry {
        name: "OIDC",
        locations: &[
            "https://openid.net/specs/openid-connect-core-1_0.html",
            "https://openid.net/specs/openid-connect-discovery-1_0.html",
            "https://openid.net/specs/openid-connect-registration-1_0.html",
            "https://openid.net/specs/oauth-v2-multiple-response-types-1_0.html",
            "https://openid.net/specs/oauth-v2-form-post-response-mode-1_0.html",
            "https://openid.net/specs/openid-connect-rpinitiated-1_0.html",
            "https://openid.net/specs/openid-connect-session-1_0.html",
            "https://openid.net/specs/openid-connect-frontchannel-1_0.html",
            "https://openid.net/specs/openid-connect-backchannel-1_0.html",
            "https://openid.net/specs/openid-connect-federation-1_0.html",
            "https://openid.net/specs/openid-connect-prompt-create-1_0.html",
            "https://openid.net/specs/openid-connect-basic-1_0.html",
            "https://openid.net/specs/openid-connect-implicit-1_0.html",
            "https://openid.net/specs/openid-connect-migration-1_0.html",
            "https://openid.net/specs/openid-connect-self-issued-v2-1_0.html",
            "https://openid.net/specs/openid-4-verifiable-presentations-1_0.html",
        ],
    },
    TopicEntry {
        name: "BOK",
        locations: &[
            "https://bok.idpro.org/article/id/49/",
            "https://bok.idpro.org/article/id/92/",
            "https://bok.idpro.org/article/id/86/",
            "https://bok.idpro.org/article/id/90/",
            "https://bok.idpro.org/article/id/41/",
            "https://bok.idpro.org/article/id/88/",
            "https://bok.idpro.org/article/id/85/",
            "https://bok.idpro.org/article/id/25/",
            "https://bok.idpro.org/article/id/84/",
            "https://bok.idpro.org/article/id/51/",
            "https://bok.idpro.org/article/id/31/",
            "https://bok.idpro.org/article/id/52/",
            "https://bok.idpro.org/article/id/80/",
            "https://bok.idpro.org/article/id/76/",
            "https://bok.idpro.org/article/id/78/",
            "https://bok.idpro.org/article/id/79/",
            "https://bok.idpro.org/article/id/11/",
            "https://bok.idpro.org/article/id/8/",
            "https://bok.idpro.org/article/id/27/",
            "https://bok.idpro.org/article/id/61/",
            "https://bok.idpro.org/article/id/62/",
            "https://bok.idpro.org/article/id/65/",
            "https://bok.idpro.org/article/id/64/",
            "https://bok.idpro.org/article/id/38/",
            "https://bok.idpro.org/article/id/39/",
            "https://bok.idpro.org/article/id/30/",
            "https://bok.idpro.org/article/id/42/",
            "https://bok.idpro.org/article/id/44/",
            "https://bok.idpro.org/article/id/45/",
            "https://bok.idpro.org/article/id/18/",
            "https://bok.idpro.org/article/id/24/",
            "https://bok.idpro.org/article/id/16/",
        ],
    },
];

/// Names of every registered topic, in declaration order.
pub fn topics() -> Vec<&'static str> {
    TOPICS.iter().map(|t| t.name).collect()
}

/// Looks up a topic by name, case-insensitively.
pub fn sources_for(topic: &str) -> Option<Vec<Source>> {
    TOPICS
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(topic))
        .map(|t| {
            t.locations
                .iter()
                .map(|location| Source::new(t.name, *location))
                .collect()
        })
}

/// Every registered source across all topics, in declaration order.
pub fn all_sources() -> Vec<Source> {
    TOPICS
        .iter()
        .flat_map(|t| {
            t.locations
                .iter()
                .map(|location| Source::new(t.name, *location))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics_are_registered() {
        let names = topics();
        assert!(names.contains(&"NIST"));
        assert!(names.contains(&"OAUTH"));
        assert!(names.contains(&"BOK"));
    }

    #[test]
    fn test_sources_for_is_case_insensitive() {
        let upper = sources_for("ENISA").expect("topic missing");
        let lower = sources_for("enisa").expect("topic missing");
        assert_eq!(upper, lower);
        assert_eq!(upper.len(), 2);
        assert!(upper.iter().all(|s| s.topic == "ENISA"));
    }

    #[test]
    fn test_sources_for_unknown_topic() {
        assert!(sources_for("SAML").is_none());
    }

    #[test]
    fn test_all_sources_flattens_every_topic() {
        let all = all_sources();
        let per_topic: usize = topics()
            .iter()
            .map(|t| sources_for(t).map(|s| s.len()).unwrap_or(0))
            .sum();
        assert_eq!(all.len(), per_topic);
        assert!(all.iter().all(|s| !s.location.is_empty()));
    }
}
