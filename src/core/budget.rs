//! 步数预算：显式计数器，每步消耗一次，继续前检查
//!
//! 预算耗尽不是错误：循环以当时的状态结束。

/// 控制循环的步数预算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepBudget {
    limit: usize,
    used: usize,
}

impl StepBudget {
    pub fn new(limit: usize) -> Self {
        Self { limit, used: 0 }
    }

    /// 尝试消耗一步；已耗尽时返回 false
    pub fn try_consume(&mut self) -> bool {
        if self.used >= self.limit {
            return false;
        }
        self.used += 1;
        true
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.used
    }

    pub fn is_exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_counts_down() {
        let mut budget = StepBudget::new(2);
        assert!(budget.try_consume());
        assert_eq!(budget.remaining(), 1);
        assert!(budget.try_consume());
        assert!(!budget.try_consume());
        assert!(budget.is_exhausted());
        assert_eq!(budget.used(), 2);
    }

    #[test]
    fn test_zero_budget_never_runs() {
        let mut budget = StepBudget::new(0);
        assert!(!budget.try_consume());
    }
}
