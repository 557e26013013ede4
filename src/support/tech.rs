//! Troubleshooting knowledge base and the `tech_support` handler

use crate::llm::{LlmProvider, LlmSubAgentHandler};
use crate::router::{CapabilityHandler, HandlerError, HandlerOutput, QueryContext, ResponseKind};
use crate::utils::{contains_phrase, normalize_for_match};
use async_trait::async_trait;
use std::fmt::Write;
use std::sync::Arc;
use tracing::debug;

/// Handler name
pub const TECH_SUPPORT: &str = "tech_support";
/// Catalog description
pub const TECH_SUPPORT_DESCRIPTION: &str = "Provides technical troubleshooting help for product issues";
/// Closing suggestion appended to every answer
pub const WARRANTY_NOTE: &str = "If the issue isn't resolved, please contact the manufacturer's support with your warranty information.";

/// A known problem and how to fix it
#[derive(Debug)]
pub struct Symptom {
    /// Short description, e.g. "won't pair"
    pub label: &'static str,
    /// Phrases that identify the problem
    pub keywords: &'static [&'static str],
    /// Ordered fix
    pub steps: &'static [&'static str],
}

/// A product family with its known problems
#[derive(Debug)]
pub struct ProductGuide {
    /// Product family name
    pub product: &'static str,
    /// Phrases that identify the product
    pub keywords: &'static [&'static str],
    /// Known problems, most specific first
    pub symptoms: &'static [Symptom],
}

/// Troubleshooting knowledge for every product we sell
pub static KNOWLEDGE_BASE: &[ProductGuide] = &[
    ProductGuide {
        product: "wireless headphones",
        keywords: &["headphones", "headphone", "headset", "earbuds"],
        symptoms: &[
            Symptom {
                label: "won't pair",
                keywords: &["pair", "pairing", "connect", "connecting", "bluetooth"],
                steps: &[
                    "Hold the power button for 10 seconds to reset the headphones.",
                    "Remove the headphones from your device's Bluetooth list.",
                    "Put the headphones in pairing mode and pair them again.",
                ],
            },
            Symptom {
                label: "no sound",
                keywords: &["no sound", "can't hear", "cannot hear", "silent", "muted"],
                steps: &[
                    "Check the volume on both your device and the headphones.",
                    "Make sure neither the device nor the headphones is muted.",
                ],
            },
            Symptom {
                label: "poor sound quality",
                keywords: &["sound quality", "poor sound", "crackling", "static", "cutting out"],
                steps: &[
                    "Move closer to the paired device.",
                    "Remove obstacles between the headphones and the device.",
                    "Check for interference from other wireless devices nearby.",
                ],
            },
        ],
    },
    ProductGuide {
        product: "laptop stand",
        keywords: &["laptop stand", "stand"],
        symptoms: &[
            Symptom {
                label: "wobbly",
                keywords: &["wobbly", "wobbles", "unstable", "shaky"],
                steps: &[
                    "Tighten all screws on the stand.",
                    "Make sure the stand sits on a flat surface.",
                ],
            },
            Symptom {
                label: "won't adjust",
                keywords: &["adjust", "adjusting", "height", "angle"],
                steps: &[
                    "Check the adjustment mechanism for debris.",
                    "Apply a little light lubricant to the hinge.",
                ],
            },
            Symptom {
                label: "laptop sliding",
                keywords: &["sliding", "slides", "slipping", "slips"],
                steps: &[
                    "Clean the rubber pads.",
                    "Make sure the pads are intact and replace any that are missing.",
                ],
            },
        ],
    },
    ProductGuide {
        product: "mechanical keyboard",
        keywords: &["keyboard", "keys", "key"],
        symptoms: &[
            Symptom {
                label: "keys sticking",
                keywords: &["sticking", "sticky", "stuck"],
                steps: &[
                    "Unplug the keyboard.",
                    "Remove the affected keycaps.",
                    "Clean underneath with compressed air and refit the keycaps.",
                ],
            },
            Symptom {
                label: "backlight not working",
                keywords: &["backlight", "lights", "light", "rgb"],
                steps: &[
                    "Check the brightness settings.",
                    "Press Fn together with the brightness key.",
                ],
            },
            Symptom {
                label: "keys not working",
                keywords: &["not working", "not responding", "unresponsive", "dead", "don't work"],
                steps: &[
                    "Try a different USB port.",
                    "Check for driver or firmware updates.",
                ],
            },
        ],
    },
    ProductGuide {
        product: "smartwatch",
        keywords: &["smartwatch", "smart watch", "watch"],
        symptoms: &[
            Symptom {
                label: "battery draining fast",
                keywords: &["battery", "draining", "drains", "dies"],
                steps: &[
                    "Reduce the screen brightness.",
                    "Disable the always-on display.",
                ],
            },
            Symptom {
                label: "won't charge",
                keywords: &["charge", "charging", "charger"],
                steps: &[
                    "Clean the charging contacts on the watch and the charger.",
                    "Try a different cable or adapter.",
                ],
            },
            Symptom {
                label: "not syncing",
                keywords: &["sync", "syncing", "notifications", "bluetooth"],
                steps: &[
                    "Restart both the watch and your phone.",
                    "Check that Bluetooth is on and the watch is connected.",
                ],
            },
        ],
    },
    ProductGuide {
        product: "phone case",
        keywords: &["phone case", "case"],
        symptoms: &[
            Symptom {
                label: "doesn't fit",
                keywords: &["fit", "fits", "too tight", "too loose"],
                steps: &[
                    "Verify the case matches your phone model.",
                    "Check for protective film left on the phone.",
                ],
            },
            Symptom {
                label: "buttons hard to press",
                keywords: &["button", "buttons"],
                steps: &[
                    "Remove the case.",
                    "Reinstall it, making sure the button covers are aligned.",
                ],
            },
        ],
    },
    ProductGuide {
        product: "USB-C cable",
        keywords: &["usb-c", "usb c", "usbc", "cable"],
        symptoms: &[
            Symptom {
                label: "slow charging",
                keywords: &["slow", "slowly"],
                steps: &["Make sure you use a power adapter with the right wattage."],
            },
            Symptom {
                label: "data transfer not working",
                keywords: &["data", "transfer", "files", "recognize", "recognized"],
                steps: &["Verify the cable supports data transfer; some cables are charge-only."],
            },
            Symptom {
                label: "not charging",
                keywords: &["not charging", "won't charge", "doesn't charge", "charge", "charging"],
                steps: &[
                    "Try a different port or adapter.",
                    "Check the port for debris.",
                ],
            },
        ],
    },
    ProductGuide {
        product: "mouse pad",
        keywords: &["mouse pad", "mousepad", "pad"],
        symptoms: &[
            Symptom {
                label: "cursor jumpy",
                keywords: &["cursor", "jumpy", "jumping", "tracking", "skipping"],
                steps: &[
                    "Clean the mouse sensor.",
                    "Make sure the pad lies flat and is clean.",
                ],
            },
            Symptom {
                label: "edges curling",
                keywords: &["curl", "curling", "curled", "edges"],
                steps: &["Place heavy books on the corners overnight."],
            },
        ],
    },
];

const GENERIC_STEPS: &[&str] = &[
    "Restart the product and the device it is used with.",
    "Check all cables, batteries and connections.",
    "Install any available firmware or driver updates.",
];

fn matches_any(normalized: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| contains_phrase(normalized, k))
}

fn numbered(out: &mut String, steps: &[&str]) {
    for (i, step) in steps.iter().enumerate() {
        // Writing to a String cannot fail
        let _ = writeln!(out, "{}. {step}", i + 1);
    }
}

/// Step-by-step guidance for a problem description
#[must_use]
pub fn troubleshoot(query: &str) -> String {
    let normalized = normalize_for_match(query);
    let guide = KNOWLEDGE_BASE
        .iter()
        .find(|guide| matches_any(&normalized, guide.keywords));

    let mut answer = String::new();
    match guide {
        Some(guide) => {
            match guide
                .symptoms
                .iter()
                .find(|symptom| matches_any(&normalized, symptom.keywords))
            {
                Some(symptom) => {
                    let _ = writeln!(
                        answer,
                        "Sorry to hear about your {} ({}). Let's fix that step by step:\n",
                        guide.product, symptom.label
                    );
                    numbered(&mut answer, symptom.steps);
                }
                None => {
                    let _ = writeln!(
                        answer,
                        "Here are the most common fixes for your {}:\n",
                        guide.product
                    );
                    for symptom in guide.symptoms {
                        let _ = writeln!(answer, "If it {}:", symptom.label);
                        numbered(&mut answer, symptom.steps);
                        answer.push('\n');
                    }
                }
            }
        }
        None => {
            answer.push_str("Sorry you're having trouble. Let's start with the basics:\n\n");
            numbered(&mut answer, GENERIC_STEPS);
        }
    }
    let _ = write!(answer, "\n{WARRANTY_NOTE}");
    answer.replace("\n\n\n", "\n\n")
}

/// Instruction for an LLM-backed `tech_support`, built from the knowledge base
#[must_use]
pub fn tech_support_instruction() -> String {
    let mut instruction = String::from(
        "You are a Technical Support Specialist. Help customers troubleshoot technical issues with their products. Answer in friendly, natural text, never JSON.\n\nCommon issues and solutions:\n",
    );
    for guide in KNOWLEDGE_BASE {
        let _ = writeln!(instruction, "\n{}:", guide.product);
        for symptom in guide.symptoms {
            let _ = writeln!(instruction, "- {}: {}", symptom.label, symptom.steps.join(" "));
        }
    }
    let _ = write!(
        instruction,
        "\nProvide step-by-step guidance and ask a clarifying question if needed. {WARRANTY_NOTE}"
    );
    instruction
}

/// LLM-backed replacement for [`TechSupportHandler`]
#[must_use]
pub fn tech_support_sub_agent(
    provider: Arc<dyn LlmProvider>,
    model: impl Into<String>,
    max_tokens: u32,
) -> LlmSubAgentHandler {
    LlmSubAgentHandler::text(TECH_SUPPORT, tech_support_instruction(), provider)
        .with_description(TECH_SUPPORT_DESCRIPTION)
        .with_model(model)
        .with_max_tokens(max_tokens)
}

/// Text handler answering from [`KNOWLEDGE_BASE`]
#[derive(Debug, Clone, Copy, Default)]
pub struct TechSupportHandler;

#[async_trait]
impl CapabilityHandler for TechSupportHandler {
    fn name(&self) -> &str {
        TECH_SUPPORT
    }

    fn kind(&self) -> ResponseKind {
        ResponseKind::Text
    }

    fn description(&self) -> &str {
        TECH_SUPPORT_DESCRIPTION
    }

    async fn invoke(
        &self,
        query: &str,
        _context: &QueryContext,
    ) -> Result<HandlerOutput, HandlerError> {
        let answer = troubleshoot(query);
        debug!(chars = answer.len(), "Troubleshooting answer composed");
        Ok(HandlerOutput::Text(answer))
    }
}
