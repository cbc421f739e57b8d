use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ideation,
    Content,
    Engagement,
    Analytics,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Ideation,
        Category::Content,
        Category::Engagement,
        Category::Analytics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ideation => "ideation",
            Category::Content => "content",
            Category::Engagement => "engagement",
            Category::Analytics => "analytics",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown tool category: {s}"))
    }
}

/// A dashboard entry. The catalog is fixed at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tool {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub platforms: &'static [Platform],
    pub url: &'static str,
    pub coming_soon: bool,
}

impl Tool {
    pub fn supports(&self, platform: Platform) -> bool {
        self.platforms.contains(&platform)
    }
}

const ALL_PLATFORMS: &[Platform] = &Platform::ALL;

static TOOLS: &[Tool] = &[
    Tool {
        name: "content-ideas",
        title: "Content Idea Generator",
        description: "Generate post ideas tailored to your niche and audience.",
        category: Category::Ideation,
        platforms: ALL_PLATFORMS,
        url: "/tools/content-ideas",
        coming_soon: false,
    },
    Tool {
        name: "youtube-video-ideas",
        title: "YouTube Video Ideas",
        description: "Find video topics with search demand in your channel's niche.",
        category: Category::Ideation,
        platforms: &[Platform::Youtube],
        url: "/tools/youtube-video-ideas",
        coming_soon: false,
    },
    Tool {
        name: "caption-writer",
        title: "Caption Writer",
        description: "Write captions in your brand voice with hashtags included.",
        category: Category::Content,
        platforms: &[Platform::Instagram, Platform::Facebook, Platform::Linkedin],
        url: "/tools/caption-writer",
        coming_soon: false,
    },
    Tool {
        name: "thread-writer",
        title: "Thread Writer",
        description: "Turn a single idea into a multi-post thread.",
        category: Category::Content,
        platforms: &[Platform::Twitter],
        url: "/tools/thread-writer",
        coming_soon: false,
    },
    Tool {
        name: "seo-optimizer",
        title: "SEO Optimizer",
        description: "Tune titles, descriptions and tags for discoverability.",
        category: Category::Content,
        platforms: &[Platform::Youtube, Platform::Linkedin],
        url: "/tools/seo-optimizer",
        coming_soon: false,
    },
    Tool {
        name: "instagram-comment-automation",
        title: "Instagram Comment Automation",
        description: "Reply to comments on your posts automatically in your chosen tone.",
        category: Category::Engagement,
        platforms: &[Platform::Instagram],
        url: "/tools/comment-automation/instagram",
        coming_soon: false,
    },
    Tool {
        name: "youtube-comment-automation",
        title: "YouTube Comment Automation",
        description: "Answer viewer comments on your videos, once or continuously.",
        category: Category::Engagement,
        platforms: &[Platform::Youtube],
        url: "/tools/comment-automation/youtube",
        coming_soon: false,
    },
    Tool {
        name: "facebook-comment-automation",
        title: "Facebook Comment Automation",
        description: "Keep page conversations going with automatic replies.",
        category: Category::Engagement,
        platforms: &[Platform::Facebook],
        url: "/tools/comment-automation/facebook",
        coming_soon: false,
    },
    Tool {
        name: "engagement-analytics",
        title: "Engagement Analytics",
        description: "Track reply rates and audience response across platforms.",
        category: Category::Analytics,
        platforms: ALL_PLATFORMS,
        url: "/tools/analytics",
        coming_soon: true,
    },
];

static BY_NAME: Lazy<HashMap<&'static str, &'static Tool>> =
    Lazy::new(|| TOOLS.iter().map(|tool| (tool.name, tool)).collect());

pub fn all() -> &'static [Tool] {
    TOOLS
}

pub fn find(name: &str) -> Option<&'static Tool> {
    BY_NAME.get(name).copied()
}

pub fn by_category(category: Category) -> Vec<&'static Tool> {
    TOOLS
        .iter()
        .filter(|tool| tool.category == category)
        .collect()
}

pub fn for_platform(platform: Platform) -> Vec<&'static Tool> {
    TOOLS.iter().filter(|tool| tool.supports(platform)).collect()
}

/// Tools that can be opened today.
pub fn available() -> Vec<&'static Tool> {
    TOOLS.iter().filter(|tool| !tool.coming_soon).collect()
}
