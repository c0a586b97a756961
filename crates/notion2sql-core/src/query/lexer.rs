/// Lexer for tokenizing SQL-like statements
///
/// Converts raw SQL text into a stream of tokens for parsing. Notion
/// property names often contain spaces, so identifiers may be quoted with
/// double quotes or backticks.
use std::fmt;

/// Token types produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Select,
    From,
    Where,
    Group,
    By,
    Having,
    OrderBy,
    Limit,
    Offset,
    As,
    And,
    Or,
    Not,
    Like,
    In,
    Between,
    Is,
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,

    // Aggregate functions
    Count,
    Sum,
    Avg,
    Min,
    Max,

    // Operators
    Eq, // =
    Ne, // != or <>
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=

    // Literals
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,

    // Identifiers, bare or quoted
    Identifier(String),

    // Punctuation
    Asterisk,   // *
    Comma,      // ,
    LeftParen,  // (
    RightParen, // )
    Semicolon,  // ;

    // Special
    Asc,
    Desc,

    // End of input
    Eof,
}

impl Token {
    /// Aggregate keywords double as column names when not followed by `(`.
    pub fn aggregate_name(&self) -> Option<&'static str> {
        match self {
            Token::Count => Some("Count"),
            Token::Sum => Some("Sum"),
            Token::Avg => Some("Avg"),
            Token::Min => Some("Min"),
            Token::Max => Some("Max"),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Select => write!(f, "SELECT"),
            Token::From => write!(f, "FROM"),
            Token::Where => write!(f, "WHERE"),
            Token::Group => write!(f, "GROUP"),
            Token::By => write!(f, "BY"),
            Token::Having => write!(f, "HAVING"),
            Token::OrderBy => write!(f, "ORDER BY"),
            Token::Limit => write!(f, "LIMIT"),
            Token::Offset => write!(f, "OFFSET"),
            Token::As => write!(f, "AS"),
            Token::And => write!(f, "AND"),
            Token::Or => write!(f, "OR"),
            Token::Not => write!(f, "NOT"),
            Token::Like => write!(f, "LIKE"),
            Token::In => write!(f, "IN"),
            Token::Between => write!(f, "BETWEEN"),
            Token::Is => write!(f, "IS"),
            Token::Insert => write!(f, "INSERT"),
            Token::Into => write!(f, "INTO"),
            Token::Values => write!(f, "VALUES"),
            Token::Update => write!(f, "UPDATE"),
            Token::Set => write!(f, "SET"),
            Token::Delete => write!(f, "DELETE"),
            Token::Count => write!(f, "COUNT"),
            Token::Sum => write!(f, "SUM"),
            Token::Avg => write!(f, "AVG"),
            Token::Min => write!(f, "MIN"),
            Token::Max => write!(f, "MAX"),
            Token::Eq => write!(f, "="),
            Token::Ne => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::Integer(i) => write!(f, "{}", i),
            Token::Float(fl) => write!(f, "{}", fl),
            Token::String(s) => write!(f, "'{}'", s),
            Token::Boolean(b) => write!(f, "{}", b),
            Token::Null => write!(f, "NULL"),
            Token::Identifier(id) => write!(f, "{}", id),
            Token::Asterisk => write!(f, "*"),
            Token::Comma => write!(f, ","),
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Semicolon => write!(f, ";"),
            Token::Asc => write!(f, "ASC"),
            Token::Desc => write!(f, "DESC"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// Lexer state
pub struct Lexer {
    input: Vec<char>,
    position: usize,
}

impl Lexer {
    /// Create a new lexer from input string
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace_and_comments();

        if self.at_end() {
            return Ok(Token::Eof);
        }

        let ch = self.current_char();

        match ch {
            '*' => {
                self.advance();
                return Ok(Token::Asterisk);
            }
            ',' => {
                self.advance();
                return Ok(Token::Comma);
            }
            '(' => {
                self.advance();
                return Ok(Token::LeftParen);
            }
            ')' => {
                self.advance();
                return Ok(Token::RightParen);
            }
            ';' => {
                self.advance();
                return Ok(Token::Semicolon);
            }
            '=' => {
                self.advance();
                return Ok(Token::Eq);
            }
            '<' => {
                self.advance();
                if self.next_is('=') {
                    return Ok(Token::Le);
                }
                if self.next_is('>') {
                    return Ok(Token::Ne);
                }
                return Ok(Token::Lt);
            }
            '>' => {
                self.advance();
                if self.next_is('=') {
                    return Ok(Token::Ge);
                }
                return Ok(Token::Gt);
            }
            '!' => {
                self.advance();
                if self.next_is('=') {
                    return Ok(Token::Ne);
                }
                return Err(LexerError::UnexpectedCharacter(ch));
            }
            '-' if self.peek_char().is_some_and(|c| c.is_ascii_digit()) => {
                return self.read_number();
            }
            '\'' => return self.read_string(),
            '"' | '`' => return self.read_quoted_identifier(ch),
            _ => {}
        }

        if ch.is_ascii_digit() {
            return self.read_number();
        }

        if ch.is_alphabetic() || ch == '_' {
            return self.read_identifier_or_keyword();
        }

        Err(LexerError::UnexpectedCharacter(ch))
    }

    /// Tokenize entire input into vector of tokens
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            if token == Token::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    /// Consume `expected` if it is the current character.
    fn next_is(&mut self, expected: char) -> bool {
        if !self.at_end() && self.current_char() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while !self.at_end() && self.current_char().is_whitespace() {
                self.advance();
            }
            // `--` runs to end of line
            if !self.at_end() && self.current_char() == '-' && self.peek_char() == Some('-') {
                while !self.at_end() && self.current_char() != '\n' {
                    self.advance();
                }
                continue;
            }
            break;
        }
    }

    fn read_number(&mut self) -> Result<Token, LexerError> {
        let start = self.position;
        let mut has_dot = false;

        if self.current_char() == '-' {
            self.advance();
        }

        while !self.at_end() {
            let ch = self.current_char();
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.' && !has_dot && self.peek_char().is_some_and(|c| c.is_ascii_digit())
            {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        let num_str: String = self.input[start..self.position].iter().collect();

        if has_dot {
            num_str
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| LexerError::InvalidNumber(num_str))
        } else {
            num_str
                .parse::<i64>()
                .map(Token::Integer)
                .map_err(|_| LexerError::InvalidNumber(num_str))
        }
    }

    fn read_string(&mut self) -> Result<Token, LexerError> {
        self.advance(); // skip opening quote
        let mut string = String::new();

        loop {
            if self.at_end() {
                return Err(LexerError::UnterminatedString);
            }
            let ch = self.current_char();
            self.advance();
            if ch == '\'' {
                // '' is an escaped quote
                if self.next_is('\'') {
                    string.push('\'');
                    continue;
                }
                break;
            }
            string.push(ch);
        }

        Ok(Token::String(string))
    }

    fn read_quoted_identifier(&mut self, quote: char) -> Result<Token, LexerError> {
        self.advance();
        let mut ident = String::new();

        loop {
            if self.at_end() {
                return Err(LexerError::UnterminatedIdentifier);
            }
            let ch = self.current_char();
            self.advance();
            if ch == quote {
                if self.next_is(quote) {
                    ident.push(quote);
                    continue;
                }
                break;
            }
            ident.push(ch);
        }

        if ident.is_empty() {
            return Err(LexerError::EmptyIdentifier);
        }
        Ok(Token::Identifier(ident))
    }

    fn read_identifier_or_keyword(&mut self) -> Result<Token, LexerError> {
        let start = self.position;

        while !self.at_end() {
            let ch = self.current_char();
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                self.advance();
            } else {
                break;
            }
        }

        let text: String = self.input[start..self.position].iter().collect();
        let uppercase = text.to_uppercase();

        // ORDER BY is a single token
        if uppercase == "ORDER" {
            let rollback = self.position;
            self.skip_whitespace_and_comments();
            let mut next_text = String::new();
            while !self.at_end() && self.current_char().is_alphabetic() {
                next_text.push(self.current_char());
                self.advance();
            }
            if next_text.eq_ignore_ascii_case("BY") {
                return Ok(Token::OrderBy);
            }
            self.position = rollback;
        }

        Ok(keyword(&uppercase).unwrap_or(Token::Identifier(text)))
    }
}

/// Keyword token for an uppercased word, `None` for identifiers.
pub(crate) fn keyword(uppercase: &str) -> Option<Token> {
    let token = match uppercase {
        "SELECT" => Token::Select,
        "FROM" => Token::From,
        "WHERE" => Token::Where,
        "GROUP" => Token::Group,
        "BY" => Token::By,
        "HAVING" => Token::Having,
        "LIMIT" => Token::Limit,
        "OFFSET" => Token::Offset,
        "AS" => Token::As,
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        "LIKE" => Token::Like,
        "IN" => Token::In,
        "BETWEEN" => Token::Between,
        "IS" => Token::Is,
        "INSERT" => Token::Insert,
        "INTO" => Token::Into,
        "VALUES" => Token::Values,
        "UPDATE" => Token::Update,
        "SET" => Token::Set,
        "DELETE" => Token::Delete,
        "COUNT" => Token::Count,
        "SUM" => Token::Sum,
        "AVG" => Token::Avg,
        "MIN" => Token::Min,
        "MAX" => Token::Max,
        "ASC" => Token::Asc,
        "DESC" => Token::Desc,
        "TRUE" => Token::Boolean(true),
        "FALSE" => Token::Boolean(false),
        "NULL" => Token::Null,
        _ => return None,
    };
    Some(token)
}

/// Lexer errors
#[derive(Debug, Clone, PartialEq)]
pub enum LexerError {
    UnexpectedCharacter(char),
    InvalidNumber(String),
    UnterminatedString,
    UnterminatedIdentifier,
    EmptyIdentifier,
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexerError::UnexpectedCharacter(ch) => write!(f, "Unexpected character: '{}'", ch),
            LexerError::InvalidNumber(s) => write!(f, "Invalid number: '{}'", s),
            LexerError::UnterminatedString => write!(f, "Unterminated string literal"),
            LexerError::UnterminatedIdentifier => write!(f, "Unterminated quoted identifier"),
            LexerError::EmptyIdentifier => write!(f, "Quoted identifier cannot be empty"),
        }
    }
}

impl std::error::Error for LexerError {}
