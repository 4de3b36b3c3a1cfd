//! WKT 元素树
//!
//! 把括号嵌套、逗号分隔的文本解析为元素树：
//!
//! ```text
//! KEYWORD[ param {, param}* {, CHILD}* ]
//! ```
//!
//! - `param`: 带引号的字符串（`""` 表示字符串内的一个引号）、带符号十进制数或裸标识符
//! - `CHILD`: 另一个 `KEYWORD[...]`
//! - `[...]` 与 `(...)` 均可，但必须成对匹配
//!
//! 语法错误携带出错位置的字符偏移。

use crate::error::WktError;
use std::fmt;

/// 最大嵌套深度
const MAX_DEPTH: usize = 128;

/// 字面参数
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
    /// 未加引号的标识符（如 `EAST`）
    Identifier(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(v) => write!(f, "{}", v),
            Literal::Text(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            Literal::Identifier(s) => write!(f, "{}", s),
        }
    }
}

/// 解析后的语法节点
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    keyword: String,
    offset: usize,
    parameters: Vec<Literal>,
    children: Vec<Element>,
}

impl Element {
    /// 直接构建元素，偏移记为 0
    pub fn new(keyword: impl Into<String>, parameters: Vec<Literal>, children: Vec<Element>) -> Self {
        Self {
            keyword: keyword.into(),
            offset: 0,
            parameters,
            children,
        }
    }

    /// 解析完整文本，文本必须恰好包含一个元素
    pub fn parse(text: &str) -> Result<Element, WktError> {
        let mut parser = Parser { text, pos: 0 };
        parser.skip_whitespace();
        let element = parser.element(0)?;
        parser.skip_whitespace();
        if parser.pos < text.len() {
            return Err(parser.error(parser.pos, "unexpected text after the element"));
        }
        Ok(element)
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// 关键字是否为 `keyword`（不区分大小写）
    pub fn is(&self, keyword: &str) -> bool {
        self.keyword.eq_ignore_ascii_case(keyword)
    }

    /// 关键字在源文本中的字符偏移
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn parameters(&self) -> &[Literal] {
        &self.parameters
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// 第一个关键字为 `keyword` 的子元素
    pub fn child(&self, keyword: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(keyword))
    }

    /// 结构错误
    pub fn malformed(&self, message: impl Into<String>) -> WktError {
        WktError::Malformed {
            keyword: self.keyword.clone(),
            offset: self.offset,
            message: message.into(),
        }
    }

    fn parameter(&self, index: usize) -> Result<&Literal, WktError> {
        self.parameters
            .get(index)
            .ok_or_else(|| self.malformed(format!("missing parameter #{}", index + 1)))
    }

    /// 第 `index` 个参数作为数值
    pub fn number(&self, index: usize) -> Result<f64, WktError> {
        match self.parameter(index)? {
            Literal::Number(v) => Ok(*v),
            other => Err(self.malformed(format!(
                "parameter #{} should be a number, found {}",
                index + 1,
                other
            ))),
        }
    }

    /// 第 `index` 个参数作为非负整数
    pub fn integer(&self, index: usize) -> Result<usize, WktError> {
        let v = self.number(index)?;
        if v < 0.0 || v.fract() != 0.0 || v > u32::MAX as f64 {
            return Err(self.malformed(format!(
                "parameter #{} should be a non-negative integer, found {}",
                index + 1,
                v
            )));
        }
        Ok(v as usize)
    }

    /// 第 `index` 个参数作为带引号的文本
    pub fn text(&self, index: usize) -> Result<&str, WktError> {
        match self.parameter(index)? {
            Literal::Text(s) => Ok(s),
            other => Err(self.malformed(format!(
                "parameter #{} should be a quoted string, found {}",
                index + 1,
                other
            ))),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.keyword)?;
        let mut first = true;
        for p in &self.parameters {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
            first = false;
        }
        for c in &self.children {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}", c)?;
            first = false;
        }
        write!(f, "]")
    }
}

/// 递归下降解析器，`pos` 为字节位置
struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// 字节位置转换为字符偏移
    fn error(&self, at: usize, message: impl Into<String>) -> WktError {
        WktError::Syntax {
            offset: self.text[..at].chars().count(),
            message: message.into(),
        }
    }

    fn identifier(&mut self) -> Result<&'a str, WktError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            Some(c) => return Err(self.error(start, format!("expected a keyword, found '{}'", c))),
            None => return Err(self.error(start, "expected a keyword, found end of text")),
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        Ok(&self.text[start..self.pos])
    }

    fn element(&mut self, depth: usize) -> Result<Element, WktError> {
        let start = self.pos;
        if depth > MAX_DEPTH {
            return Err(self.error(start, "elements nested too deeply"));
        }
        let keyword = self.identifier()?;
        self.skip_whitespace();
        let close = match self.bump() {
            Some('[') => ']',
            Some('(') => ')',
            _ => return Err(self.error(start, format!("expected '[' or '(' after {}", keyword))),
        };
        self.element_body(keyword, start, close, depth)
    }

    fn element_body(
        &mut self,
        keyword: &str,
        start: usize,
        close: char,
        depth: usize,
    ) -> Result<Element, WktError> {
        let mut element = Element {
            keyword: keyword.to_string(),
            offset: self.text[..start].chars().count(),
            parameters: Vec::new(),
            children: Vec::new(),
        };

        self.skip_whitespace();
        if self.peek() == Some(close) {
            self.bump();
            return Ok(element);
        }

        loop {
            self.skip_whitespace();
            let item_start = self.pos;
            match self.peek() {
                Some('"') => element.parameters.push(Literal::Text(self.quoted()?)),
                Some(c) if c.is_ascii_digit() || matches!(c, '+' | '-' | '.') => {
                    element.parameters.push(Literal::Number(self.number()?))
                }
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                    let word = self.identifier()?;
                    self.skip_whitespace();
                    match self.peek() {
                        Some('[') | Some('(') => {
                            self.pos = item_start;
                            element.children.push(self.element(depth + 1)?);
                        }
                        _ => element.parameters.push(Literal::Identifier(word.to_string())),
                    }
                }
                Some(c) => return Err(self.error(item_start, format!("unexpected character '{}'", c))),
                None => return Err(self.error(item_start, format!("missing closing '{}'", close))),
            }

            self.skip_whitespace();
            let separator = self.pos;
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(element),
                Some(c) => {
                    return Err(self.error(
                        separator,
                        format!("expected ',' or '{}', found '{}'", close, c),
                    ))
                }
                None => return Err(self.error(separator, format!("missing closing '{}'", close))),
            }
        }
    }

    fn quoted(&mut self) -> Result<String, WktError> {
        let start = self.pos;
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') if self.peek() == Some('"') => {
                    self.bump();
                    value.push('"');
                }
                Some('"') => return Ok(value),
                Some(c) => value.push(c),
                None => return Err(self.error(start, "unterminated quoted string")),
            }
        }
    }

    fn number(&mut self) -> Result<f64, WktError> {
        let start = self.pos;
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            self.bump();
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.bump();
            }
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        let literal = &self.text[start..self.pos];
        literal
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.error(start, format!("invalid number '{}'", literal)))
    }
}
