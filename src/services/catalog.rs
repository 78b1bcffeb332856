//! 题库能力 - 业务能力层
//!
//! 持有全部题目，回答"按科目 / 关键词筛选"的查询。筛选都是纯函数。

use std::collections::HashSet;

use crate::error::BusinessError;
use crate::models::{Complexity, Question, QuestionType};

/// 科目筛选的哨兵值，表示不按科目过滤
pub const ALL_SUBJECTS: &str = "All";

/// 按科目和题干关键词筛选
///
/// - 关键词：题干不区分大小写的子串匹配
/// - 科目：精确匹配，`"All"` 跳过科目检查
///
/// 结果保持题库顺序。
pub fn filter<'a>(questions: &'a [Question], subject: &str, search: &str) -> Vec<&'a Question> {
    let needle = search.to_lowercase();
    questions
        .iter()
        .filter(|q| matches_text(q, &needle) && matches_subject(q, subject))
        .collect()
}

/// 所有科目，`"All"` 永远排第一，其余按首次出现顺序去重
pub fn distinct_subjects(questions: &[Question]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut subjects = vec![ALL_SUBJECTS.to_string()];
    for q in questions {
        if q.subject != ALL_SUBJECTS && seen.insert(q.subject.as_str()) {
            subjects.push(q.subject.clone());
        }
    }
    subjects
}

fn matches_text(question: &Question, lowercase_needle: &str) -> bool {
    lowercase_needle.is_empty() || question.text.to_lowercase().contains(lowercase_needle)
}

fn matches_subject(question: &Question, subject: &str) -> bool {
    subject == ALL_SUBJECTS || question.subject == subject
}

/// 完整的题目筛选条件，对应远程 `GET /exam/all-questions` 的查询参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionFilter {
    pub subject: String,
    pub search: String,
    pub complexity: Option<Complexity>,
    pub kind: Option<QuestionType>,
    pub tag: Option<String>,
}

impl Default for QuestionFilter {
    fn default() -> Self {
        Self {
            subject: ALL_SUBJECTS.to_string(),
            search: String::new(),
            complexity: None,
            kind: None,
            tag: None,
        }
    }
}

impl QuestionFilter {
    pub fn apply<'a>(&self, questions: &'a [Question]) -> Vec<&'a Question> {
        filter(questions, &self.subject, &self.search)
            .into_iter()
            .filter(|q| self.complexity.map_or(true, |c| q.complexity == c))
            .filter(|q| self.kind.map_or(true, |k| q.kind == k))
            .filter(|q| {
                self.tag
                    .as_deref()
                    .map_or(true, |t| q.tags.iter().any(|tag| tag == t))
            })
            .collect()
    }

    /// 查询参数；空条件不发送
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if !self.search.is_empty() {
            pairs.push(("search_term", self.search.clone()));
        }
        if let Some(c) = self.complexity {
            pairs.push(("complexity", c.name().to_string()));
        }
        if let Some(k) = self.kind {
            pairs.push(("ques_type", k.name().to_string()));
        }
        if self.subject != ALL_SUBJECTS {
            pairs.push(("tags", self.subject.clone()));
        }
        if let Some(t) = &self.tag {
            pairs.push(("tags", t.clone()));
        }
        pairs
    }
}

/// 题库快照
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    questions: Vec<Question>,
}

impl Catalog {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn filter(&self, subject: &str, search: &str) -> Vec<&Question> {
        filter(&self.questions, subject, search)
    }

    pub fn distinct_subjects(&self) -> Vec<String> {
        distinct_subjects(&self.questions)
    }

    /// 整批追加：先校验整批（结构合法、ID 不重复），全部通过才写入
    pub fn append_batch(&mut self, batch: Vec<Question>) -> Result<usize, BusinessError> {
        let mut batch_ids = HashSet::new();
        for question in &batch {
            question.validate()?;
            if self.contains(&question.id) || !batch_ids.insert(question.id.as_str()) {
                return Err(BusinessError::DuplicateQuestionId {
                    id: question.id.clone(),
                });
            }
        }
        let count = batch.len();
        self.questions.extend(batch);
        Ok(count)
    }

    /// 删除题目，返回被删除的题目和它原来的位置
    pub fn remove(&mut self, id: &str) -> Option<(usize, Question)> {
        let index = self.questions.iter().position(|q| q.id == id)?;
        Some((index, self.questions.remove(index)))
    }

    /// 用服务端分配的 ID 替换本地 ID
    pub fn rebind_id(&mut self, local_id: &str, server_id: &str) -> bool {
        match self.questions.iter_mut().find(|q| q.id == local_id) {
            Some(q) => {
                q.id = server_id.to_string();
                true
            }
            None => false,
        }
    }

    /// 用远程最新数据覆盖同 ID 的题目，位置不变
    pub fn refresh(&mut self, question: Question) -> bool {
        match self.questions.iter_mut().find(|q| q.id == question.id) {
            Some(slot) => {
                *slot = question;
                true
            }
            None => false,
        }
    }

    pub fn replace_all(&mut self, questions: Vec<Question>) {
        self.questions = questions;
    }
}
