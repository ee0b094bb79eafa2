use serde::{Deserialize, Serialize};

use super::flag::FlagValue;

/// Read access to the parts of game state a condition can inspect.
///
/// Implemented by the runtime state; conditions never see anything else.
pub trait ConditionContext {
    /// Story flag value, falling back to discovery flags.
    fn flag(&self, name: &str) -> Option<FlagValue>;
    /// True once the named scene has been finished.
    fn scene_completed(&self, scene: &str) -> bool;
    fn location_visited(&self, location: &str) -> bool;
    fn stat(&self, stat: &str) -> Option<i64>;
    fn item_count(&self, item: &str) -> u32;
}

fn default_flag_value() -> FlagValue {
    FlagValue::Bool(true)
}

/// A predicate over game state gating a location or a choice.
///
/// Conditions nest through `Any`, `All` and `Not`. Evaluation is pure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UnlockCondition {
    /// The named flag equals `value`. An absent flag reads as `Bool(false)`.
    Flag {
        name: String,
        #[serde(default = "default_flag_value")]
        value: FlagValue,
    },
    /// The named scene is in the visited (finished) set.
    SceneComplete(String),
    LocationVisited(String),
    StatAtLeast { stat: String, min: i64 },
    HasItem(String),
    Any(Vec<UnlockCondition>),
    All(Vec<UnlockCondition>),
    Not(Box<UnlockCondition>),
}

impl UnlockCondition {
    pub fn flag(name: &str, value: impl Into<FlagValue>) -> Self {
        Self::Flag {
            name: name.to_string(),
            value: value.into(),
        }
    }

    pub fn scene_complete(scene: &str) -> Self {
        Self::SceneComplete(scene.to_string())
    }

    pub fn evaluate<C: ConditionContext + ?Sized>(&self, ctx: &C) -> bool {
        match self {
            Self::Flag { name, value } => ctx.flag(name).unwrap_or(FlagValue::UNSET) == *value,
            Self::SceneComplete(scene) => ctx.scene_completed(scene),
            Self::LocationVisited(location) => ctx.location_visited(location),
            Self::StatAtLeast { stat, min } => ctx.stat(stat).is_some_and(|v| v >= *min),
            Self::HasItem(item) => ctx.item_count(item) > 0,
            // Empty `Any` is false, empty `All` is true.
            Self::Any(conditions) => conditions.iter().any(|c| c.evaluate(ctx)),
            Self::All(conditions) => conditions.iter().all(|c| c.evaluate(ctx)),
            Self::Not(inner) => !inner.evaluate(ctx),
        }
    }

    /// Visit every leaf condition, depth first.
    pub fn for_each_leaf<F: FnMut(&UnlockCondition)>(&self, f: &mut F) {
        match self {
            Self::Any(conditions) | Self::All(conditions) => {
                for c in conditions {
                    c.for_each_leaf(f);
                }
            }
            Self::Not(inner) => inner.for_each_leaf(f),
            leaf => f(leaf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    struct Ctx {
        flags: HashMap<String, FlagValue>,
        scenes: HashSet<String>,
        locations: HashSet<String>,
        stats: HashMap<String, i64>,
        items: HashMap<String, u32>,
    }

    impl ConditionContext for Ctx {
        fn flag(&self, name: &str) -> Option<FlagValue> {
            self.flags.get(name).cloned()
        }
        fn scene_completed(&self, scene: &str) -> bool {
            self.scenes.contains(scene)
        }
        fn location_visited(&self, location: &str) -> bool {
            self.locations.contains(location)
        }
        fn stat(&self, stat: &str) -> Option<i64> {
            self.stats.get(stat).copied()
        }
        fn item_count(&self, item: &str) -> u32 {
            self.items.get(item).copied().unwrap_or(0)
        }
    }

    #[test]
    fn flag_matches_value() {
        let mut ctx = Ctx::default();
        let cond = UnlockCondition::flag("paid_toll", true);
        assert!(!cond.evaluate(&ctx));
        ctx.flags.insert("paid_toll".into(), FlagValue::Bool(true));
        assert!(cond.evaluate(&ctx));
    }

    #[test]
    fn absent_flag_reads_false() {
        let ctx = Ctx::default();
        assert!(UnlockCondition::flag("betrayed", false).evaluate(&ctx));
        assert!(!UnlockCondition::flag("debt", 0i64).evaluate(&ctx));
    }

    #[test]
    fn scene_complete() {
        let mut ctx = Ctx::default();
        let cond = UnlockCondition::scene_complete("1-2-awakening");
        assert!(!cond.evaluate(&ctx));
        ctx.scenes.insert("1-2-awakening".into());
        assert!(cond.evaluate(&ctx));
    }

    #[test]
    fn nested_any_all_not() {
        let mut ctx = Ctx::default();
        ctx.stats.insert("strength".into(), 7);
        ctx.items.insert("lockpick".into(), 1);

        let cond = UnlockCondition::Any(vec![
            UnlockCondition::flag("has_key", true),
            UnlockCondition::All(vec![
                UnlockCondition::HasItem("lockpick".into()),
                UnlockCondition::StatAtLeast {
                    stat: "strength".into(),
                    min: 5,
                },
                UnlockCondition::Not(Box::new(UnlockCondition::LocationVisited(
                    "watch-house".into(),
                ))),
            ]),
        ]);
        assert!(cond.evaluate(&ctx));

        ctx.locations.insert("watch-house".into());
        assert!(!cond.evaluate(&ctx));
    }

    #[test]
    fn empty_combinators() {
        let ctx = Ctx::default();
        assert!(!UnlockCondition::Any(vec![]).evaluate(&ctx));
        assert!(UnlockCondition::All(vec![]).evaluate(&ctx));
    }

    #[test]
    fn unknown_stat_fails() {
        let ctx = Ctx::default();
        let cond = UnlockCondition::StatAtLeast {
            stat: "charm".into(),
            min: 0,
        };
        assert!(!cond.evaluate(&ctx));
    }

    #[test]
    fn leaves_are_visited() {
        let cond = UnlockCondition::Any(vec![
            UnlockCondition::scene_complete("a"),
            UnlockCondition::Not(Box::new(UnlockCondition::All(vec![
                UnlockCondition::scene_complete("b"),
                UnlockCondition::HasItem("c".into()),
            ]))),
        ]);
        let mut count = 0;
        cond.for_each_leaf(&mut |_: &UnlockCondition| count += 1);
        assert_eq!(count, 3);
    }

    #[test]
    fn ron_shape() {
        let cond: UnlockCondition = ron::from_str(
            r#"Any([SceneComplete("1-2-awakening"), Flag(name: "bribed_guard")])"#,
        )
        .unwrap();
        let mut ctx = Ctx::default();
        ctx.flags.insert("bribed_guard".into(), FlagValue::Bool(true));
        assert!(cond.evaluate(&ctx));
    }
}
