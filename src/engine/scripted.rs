//! 脚本推理引擎（用于测试与演示，无需模型）
//!
//! 按配置名维护决策队列，每步弹出一个；id 为空的工具调用会被分配 uuid。

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::engine::{ReasoningEngine, StepDecision, StepRequest};

/// 脚本引擎：profile -> 决策队列
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    scripts: Mutex<HashMap<String, VecDeque<StepDecision>>>,
    seen: Mutex<Vec<StepRequest>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为某个配置追加决策
    pub fn script(self, profile: impl Into<String>, decisions: Vec<StepDecision>) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.entry(profile.into()).or_default().extend(decisions);
        }
        self
    }

    /// 从 JSON 加载：{"main": [decision, ...], "researcher": [...]}
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let parsed: HashMap<String, Vec<StepDecision>> = serde_json::from_str(json)?;
        Ok(parsed
            .into_iter()
            .fold(Self::new(), |engine, (profile, decisions)| engine.script(profile, decisions)))
    }

    /// 已收到的请求（按时间顺序）
    pub fn requests(&self) -> Vec<StepRequest> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// 某配置剩余未消费的决策数
    pub fn remaining(&self, profile: &str) -> usize {
        self.scripts
            .lock()
            .map(|s| s.get(profile).map(VecDeque::len).unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn step(&self, request: &StepRequest) -> Result<StepDecision, String> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }
        let next = self
            .scripts
            .lock()
            .map_err(|_| "script lock poisoned".to_string())?
            .get_mut(&request.profile)
            .and_then(VecDeque::pop_front);
        match next {
            Some(StepDecision::ToolCalls { thought, mut calls }) => {
                for call in calls.iter_mut().filter(|c| c.id.is_empty()) {
                    call.id = uuid::Uuid::new_v4().to_string();
                }
                Ok(StepDecision::ToolCalls { thought, calls })
            }
            Some(finish) => Ok(finish),
            None => Err(format!("script for profile '{}' is exhausted", request.profile)),
        }
    }
}
