// ==========================================
// 学年升级批处理 - 学号分配器
// ==========================================
// 作用域: 单次 process 调用;不持久化,不跨批次共享
// 键: 目标 (班级, 分班);未分班时按班级整体编号
// ==========================================

use std::collections::{HashMap, HashSet};

type SectionKey = (String, Option<String>);

#[derive(Debug, Default)]
struct SectionCounter {
    next: u32,
    taken: HashSet<String>,
}

/// 按目标分班顺序分配学号
#[derive(Debug)]
pub struct RollNumberAllocator {
    start: u32,
    sections: HashMap<SectionKey, SectionCounter>,
}

impl RollNumberAllocator {
    pub fn new(start: u32) -> Self {
        Self {
            start: start.max(1),
            sections: HashMap::new(),
        }
    }

    fn counter(&mut self, class_id: &str, section_id: Option<&str>) -> &mut SectionCounter {
        let start = self.start;
        self.sections
            .entry((class_id.to_string(), section_id.map(str::to_string)))
            .or_insert_with(|| SectionCounter {
                next: start,
                taken: HashSet::new(),
            })
    }

    /// 登记人工指定的学号,自动分配时跳过
    pub fn reserve(&mut self, class_id: &str, section_id: Option<&str>, roll_number: &str) {
        self.counter(class_id, section_id)
            .taken
            .insert(roll_number.to_string());
    }

    /// 分配下一个未被占用的学号
    pub fn next(&mut self, class_id: &str, section_id: Option<&str>) -> String {
        let counter = self.counter(class_id, section_id);
        loop {
            let candidate = counter.next.to_string();
            counter.next += 1;
            if counter.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    #[cfg(test)]
    fn section_count(&self) -> usize {
        self.sections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_per_section_starting_at_one() {
        let mut alloc = RollNumberAllocator::new(1);
        assert_eq!(alloc.next("c6", Some("A")), "1");
        assert_eq!(alloc.next("c6", Some("A")), "2");
        assert_eq!(alloc.next("c6", Some("B")), "1");
        assert_eq!(alloc.next("c6", None), "1");
        assert_eq!(alloc.next("c6", Some("A")), "3");
        assert_eq!(alloc.section_count(), 3);
    }

    #[test]
    fn test_skips_reserved_numbers() {
        let mut alloc = RollNumberAllocator::new(1);
        alloc.reserve("c6", Some("A"), "2");
        alloc.reserve("c6", Some("A"), "3");
        assert_eq!(alloc.next("c6", Some("A")), "1");
        assert_eq!(alloc.next("c6", Some("A")), "4");
        // 其他分班不受影响
        assert_eq!(alloc.next("c6", Some("B")), "1");
    }

    #[test]
    fn test_zero_start_is_raised_to_one() {
        let mut alloc = RollNumberAllocator::new(0);
        assert_eq!(alloc.next("c6", None), "1");
    }
}
