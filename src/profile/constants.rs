//! Fixed pieces of the generated document: group names, terminal actions,
//! and the versioned routing-rule table. None of this depends on the
//! decoded node set.

/// Built-in engine actions usable as rule targets and group members.
pub const DIRECT: &str = "DIRECT";
pub const REJECT: &str = "REJECT";

pub const GROUP_PROXY: &str = "Proxy";
pub const GROUP_AI: &str = "AIService";
pub const GROUP_STREAMING: &str = "Streaming";
pub const GROUP_ADBLOCK: &str = "AdBlock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMatcher {
    DomainSuffix,
    DomainKeyword,
    IpCidr,
    Geoip,
    Match,
}

impl RuleMatcher {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleMatcher::DomainSuffix => "DOMAIN-SUFFIX",
            RuleMatcher::DomainKeyword => "DOMAIN-KEYWORD",
            RuleMatcher::IpCidr => "IP-CIDR",
            RuleMatcher::Geoip => "GEOIP",
            RuleMatcher::Match => "MATCH",
        }
    }
}

/// One routing rule. First match wins, so table order is significant.
#[derive(Debug, Clone, Copy)]
pub struct RoutingRule {
    pub matcher: RuleMatcher,
    pub pattern: &'static str,
    pub target: &'static str,
}

impl RoutingRule {
    const fn new(matcher: RuleMatcher, pattern: &'static str, target: &'static str) -> Self {
        Self {
            matcher,
            pattern,
            target,
        }
    }

    /// Clash rule-line form, e.g. `DOMAIN-SUFFIX,netflix.com,Streaming`.
    pub fn render(&self) -> String {
        match self.matcher {
            RuleMatcher::Match => format!("MATCH,{}", self.target),
            RuleMatcher::IpCidr => {
                format!("IP-CIDR,{},{},no-resolve", self.pattern, self.target)
            }
            _ => format!("{},{},{}", self.matcher.as_str(), self.pattern, self.target),
        }
    }
}

use RuleMatcher::{DomainKeyword, DomainSuffix, Geoip, IpCidr, Match};

/// The fixed rule table, ordered: private ranges, ads, AI services,
/// streaming, general foreign sites, domestic sites, country catch-all,
/// final wildcard.
pub const RULE_TABLE: &[RoutingRule] = &[
    // Private and special-use networks never leave the machine.
    RoutingRule::new(IpCidr, "127.0.0.0/8", DIRECT),
    RoutingRule::new(IpCidr, "10.0.0.0/8", DIRECT),
    RoutingRule::new(IpCidr, "172.16.0.0/12", DIRECT),
    RoutingRule::new(IpCidr, "192.168.0.0/16", DIRECT),
    RoutingRule::new(IpCidr, "100.64.0.0/10", DIRECT),
    RoutingRule::new(IpCidr, "198.18.0.0/16", DIRECT),
    // Ad networks.
    RoutingRule::new(DomainSuffix, "doubleclick.net", GROUP_ADBLOCK),
    RoutingRule::new(DomainSuffix, "googlesyndication.com", GROUP_ADBLOCK),
    RoutingRule::new(DomainSuffix, "googleadservices.com", GROUP_ADBLOCK),
    RoutingRule::new(DomainSuffix, "adservice.google.com", GROUP_ADBLOCK),
    RoutingRule::new(DomainKeyword, "adnxs", GROUP_ADBLOCK),
    RoutingRule::new(DomainSuffix, "ads.twitter.com", GROUP_ADBLOCK),
    // AI services.
    RoutingRule::new(DomainSuffix, "openai.com", GROUP_AI),
    RoutingRule::new(DomainSuffix, "chatgpt.com", GROUP_AI),
    RoutingRule::new(DomainSuffix, "oaistatic.com", GROUP_AI),
    RoutingRule::new(DomainSuffix, "anthropic.com", GROUP_AI),
    RoutingRule::new(DomainSuffix, "claude.ai", GROUP_AI),
    RoutingRule::new(DomainSuffix, "gemini.google.com", GROUP_AI),
    RoutingRule::new(DomainSuffix, "perplexity.ai", GROUP_AI),
    RoutingRule::new(DomainSuffix, "x.ai", GROUP_AI),
    // Streaming.
    RoutingRule::new(DomainSuffix, "netflix.com", GROUP_STREAMING),
    RoutingRule::new(DomainSuffix, "nflxvideo.net", GROUP_STREAMING),
    RoutingRule::new(DomainSuffix, "youtube.com", GROUP_STREAMING),
    RoutingRule::new(DomainSuffix, "ytimg.com", GROUP_STREAMING),
    RoutingRule::new(DomainSuffix, "googlevideo.com", GROUP_STREAMING),
    RoutingRule::new(DomainSuffix, "disneyplus.com", GROUP_STREAMING),
    RoutingRule::new(DomainSuffix, "hulu.com", GROUP_STREAMING),
    RoutingRule::new(DomainSuffix, "spotify.com", GROUP_STREAMING),
    // General foreign sites.
    RoutingRule::new(DomainSuffix, "google.com", GROUP_PROXY),
    RoutingRule::new(DomainSuffix, "github.com", GROUP_PROXY),
    RoutingRule::new(DomainSuffix, "githubusercontent.com", GROUP_PROXY),
    RoutingRule::new(DomainSuffix, "twitter.com", GROUP_PROXY),
    RoutingRule::new(DomainSuffix, "x.com", GROUP_PROXY),
    RoutingRule::new(DomainSuffix, "facebook.com", GROUP_PROXY),
    RoutingRule::new(DomainSuffix, "instagram.com", GROUP_PROXY),
    RoutingRule::new(DomainSuffix, "telegram.org", GROUP_PROXY),
    RoutingRule::new(DomainSuffix, "wikipedia.org", GROUP_PROXY),
    RoutingRule::new(DomainSuffix, "reddit.com", GROUP_PROXY),
    RoutingRule::new(DomainSuffix, "discord.com", GROUP_PROXY),
    // Domestic sites.
    RoutingRule::new(DomainSuffix, "baidu.com", DIRECT),
    RoutingRule::new(DomainSuffix, "qq.com", DIRECT),
    RoutingRule::new(DomainSuffix, "taobao.com", DIRECT),
    RoutingRule::new(DomainSuffix, "jd.com", DIRECT),
    RoutingRule::new(DomainSuffix, "weibo.com", DIRECT),
    RoutingRule::new(DomainSuffix, "bilibili.com", DIRECT),
    RoutingRule::new(DomainSuffix, "aliyun.com", DIRECT),
    RoutingRule::new(DomainSuffix, "163.com", DIRECT),
    // Catch-alls.
    RoutingRule::new(Geoip, "CN", DIRECT),
    RoutingRule::new(Match, "", GROUP_PROXY),
];
