//! Compilation engine.
//!
//! Recursive descent over the Jack grammar. Each `compile_*` method
//! assumes the tokenizer's current token is the first token of its
//! production, consumes exactly the production's tokens, and leaves
//! the tokenizer positioned on the token that follows. VM
//! instructions are emitted inline while the grammar is walked;
//! there is no intermediate tree.
use std::io::{BufRead, Write};

use itertools::Itertools;
use log::debug;
use smol_str::SmolStr;

use crate::{
    error::{CompileError, JackError, JackResult},
    symbols::{SymbolKind, SymbolTable},
    tokenizer::Tokenizer,
    tokens::{Keyword, Token, TokenKind},
    writer::{Command, Segment, VmWriter},
};

const OPS: [char; 9] = ['+', '-', '*', '/', '&', '|', '<', '>', '='];
const UNARY_OPS: [char; 2] = ['-', '~'];

const KEYWORD_CONSTANTS: [Keyword; 4] =
    [Keyword::True, Keyword::False, Keyword::Null, Keyword::This];

const STATEMENT_KEYWORDS: [Keyword; 5] = [
    Keyword::Let,
    Keyword::If,
    Keyword::While,
    Keyword::Do,
    Keyword::Return,
];

/// Compiles one Jack class from a token stream into VM instructions.
pub struct CompilationEngine<R, W> {
    tokens: Tokenizer<R>,
    symbols: SymbolTable,
    writer: VmWriter<W>,
    class_name: SmolStr,
    subroutine_name: SmolStr,
    subroutine_kind: Option<Keyword>,
    if_index: u16,
    while_index: u16,
}

impl<R: BufRead, W: Write> CompilationEngine<R, W> {
    pub fn new(input: R, output: W) -> JackResult<Self> {
        Ok(Self {
            tokens: Tokenizer::new(input)?,
            symbols: SymbolTable::new(),
            writer: VmWriter::new(output),
            class_name: SmolStr::default(),
            subroutine_name: SmolStr::default(),
            subroutine_kind: None,
            if_index: 0,
            while_index: 0,
        })
    }

    /// Compiles the single class held by the source stream.
    ///
    /// `class`: `'class' className '{' classVarDec* subroutineDec* '}'`
    pub fn compile_class(mut self) -> JackResult<()> {
        self.tokens.advance()?;
        self.expect_keyword(Keyword::Class)?;
        self.tokens.advance()?;
        self.class_name = self.expect_class_name_definition()?;
        debug!("compiling class {}", self.class_name);
        self.tokens.advance()?;
        self.expect_symbol('{')?;
        self.tokens.advance()?;

        while self.at_class_var_dec() {
            self.compile_class_var_dec()?;
        }
        while self.at_subroutine_dec() {
            self.compile_subroutine_dec()?;
        }

        self.expect_symbol('}')?;

        if self.tokens.has_more() {
            self.tokens.advance()?;
            return Err(self.error("trailing tokens after the end of the class definition"));
        }

        Ok(())
    }

    /// `classVarDec`: `('static'|'field') type varName (',' varName)* ';'`
    fn compile_class_var_dec(&mut self) -> JackResult<()> {
        let kind = match self.expect_keyword_in(&[Keyword::Static, Keyword::Field])? {
            Keyword::Static => SymbolKind::Static,
            _ => SymbolKind::Field,
        };
        self.tokens.advance()?;

        let ty = self.expect_type()?;
        self.tokens.advance()?;
        self.define_variable(kind, &ty)?;
        self.tokens.advance()?;

        while self.at_symbol(',') {
            self.tokens.advance()?;
            self.define_variable(kind, &ty)?;
            self.tokens.advance()?;
        }

        self.expect_symbol(';')?;
        self.tokens.advance()?;
        Ok(())
    }

    /// `subroutineDec`: `('constructor'|'function'|'method')
    /// ('void'|type) subroutineName '(' parameterList ')' subroutineBody`
    fn compile_subroutine_dec(&mut self) -> JackResult<()> {
        self.symbols.start_subroutine();
        self.if_index = 0;
        self.while_index = 0;

        let kind = self.expect_keyword_in(&[
            Keyword::Constructor,
            Keyword::Function,
            Keyword::Method,
        ])?;
        self.subroutine_kind = Some(kind);
        self.tokens.advance()?;

        self.expect_return_type()?;
        self.tokens.advance()?;

        self.subroutine_name = self.expect_subroutine_definition()?;
        self.tokens.advance()?;

        self.expect_symbol('(')?;
        self.tokens.advance()?;
        self.compile_parameter_list()?;
        self.expect_symbol(')')?;
        self.tokens.advance()?;

        self.compile_subroutine_body()
    }

    /// `parameterList`: `( type varName (',' type varName)* )?`
    ///
    /// A method receives the current object as argument 0, so `this`
    /// is defined before the declared parameters and they receive
    /// argument indices starting at 1.
    fn compile_parameter_list(&mut self) -> JackResult<()> {
        if self.subroutine_kind == Some(Keyword::Method) {
            self.symbols
                .define(SmolStr::new("this"), self.class_name.clone(), SymbolKind::Arg);
        }

        if self.at_type() {
            let ty = self.expect_type()?;
            self.tokens.advance()?;
            self.define_variable(SymbolKind::Arg, &ty)?;
            self.tokens.advance()?;

            while self.at_symbol(',') {
                self.tokens.advance()?;
                let ty = self.expect_type()?;
                self.tokens.advance()?;
                self.define_variable(SymbolKind::Arg, &ty)?;
                self.tokens.advance()?;
            }
        }

        Ok(())
    }

    /// `subroutineBody`: `'{' varDec* statement* '}'`
    ///
    /// The function declaration can only be emitted once all local
    /// variables are known. A method then anchors `this` to the
    /// receiver, a constructor to a freshly allocated field block,
    /// before any statement executes.
    fn compile_subroutine_body(&mut self) -> JackResult<()> {
        self.expect_symbol('{')?;
        self.tokens.advance()?;

        while self.at_keyword(Keyword::Var) {
            self.compile_var_dec()?;
        }

        let function_name = format!("{}.{}", self.class_name, self.subroutine_name);
        debug!("compiling subroutine {}", function_name);
        self.writer
            .write_function(&function_name, self.symbols.var_count(SymbolKind::Var))?;

        match self.subroutine_kind {
            Some(Keyword::Method) => {
                self.writer.write_push(Segment::Argument, 0)?;
                self.writer.write_pop(Segment::Pointer, 0)?;
            }
            Some(Keyword::Constructor) => {
                self.writer
                    .write_push(Segment::Constant, self.symbols.var_count(SymbolKind::Field))?;
                self.writer.write_call("Memory.alloc", 1)?;
                self.writer.write_pop(Segment::Pointer, 0)?;
            }
            _ => {}
        }

        self.compile_statements()?;

        self.expect_symbol('}')?;
        self.tokens.advance()?;
        Ok(())
    }

    /// `varDec`: `'var' type varName (',' varName)* ';'`
    fn compile_var_dec(&mut self) -> JackResult<()> {
        self.expect_keyword(Keyword::Var)?;
        self.tokens.advance()?;

        let ty = self.expect_type()?;
        self.tokens.advance()?;
        self.define_variable(SymbolKind::Var, &ty)?;
        self.tokens.advance()?;

        while self.at_symbol(',') {
            self.tokens.advance()?;
            self.define_variable(SymbolKind::Var, &ty)?;
            self.tokens.advance()?;
        }

        self.expect_symbol(';')?;
        self.tokens.advance()?;
        Ok(())
    }

    fn compile_statements(&mut self) -> JackResult<()> {
        while self.at_statement() {
            match self.token().keyword() {
                Some(Keyword::Let) => self.compile_let()?,
                Some(Keyword::If) => self.compile_if()?,
                Some(Keyword::While) => self.compile_while()?,
                Some(Keyword::Do) => self.compile_do()?,
                Some(Keyword::Return) => self.compile_return()?,
                _ => return Err(self.error("invalid statement")),
            }
        }
        Ok(())
    }

    /// `letStmt`: `'let' varName ('[' expression ']')? '=' expression ';'`
    fn compile_let(&mut self) -> JackResult<()> {
        self.expect_keyword(Keyword::Let)?;
        self.tokens.advance()?;

        let name = self.expect_identifier()?;
        let (segment, index) = self.resolve_variable(&name)?;
        self.tokens.advance()?;

        let array_store = self.try_compile_array_store_target(&name)?;

        self.expect_symbol('=')?;
        self.tokens.advance()?;
        self.compile_expression()?;
        self.expect_symbol(';')?;

        if array_store {
            // The value is parked in temp 0 while `that` is anchored,
            // because the right-hand expression may itself have used
            // pointer 1 for its own array accesses.
            self.writer.write_pop(Segment::Temp, 0)?;
            self.writer.write_pop(Segment::Pointer, 1)?;
            self.writer.write_push(Segment::Temp, 0)?;
            self.writer.write_pop(Segment::That, 0)?;
        } else {
            self.writer.write_pop(segment, index)?;
        }

        self.tokens.advance()?;
        Ok(())
    }

    /// Recognizes the `'[' expression ']'` subscript of a `let`
    /// target. Leaves the element address computation on the stack
    /// (index plus array base) and reports whether a subscript was
    /// present.
    fn try_compile_array_store_target(&mut self, name: &SmolStr) -> JackResult<bool> {
        if !self.at_symbol('[') {
            return Ok(false);
        }
        self.tokens.advance()?;

        self.compile_expression()?;
        self.expect_symbol(']')?;

        let (segment, index) = self.resolve_variable(name)?;
        self.writer.write_push(segment, index)?;
        self.writer.write_arithmetic(Command::Add)?;

        self.tokens.advance()?;
        Ok(true)
    }

    /// `ifStmt`: `'if' '(' expression ')' '{' statement* '}'
    /// ('else' '{' statement* '}')?`
    fn compile_if(&mut self) -> JackResult<()> {
        self.expect_keyword(Keyword::If)?;
        self.tokens.advance()?;
        self.expect_symbol('(')?;
        self.tokens.advance()?;

        self.compile_expression()?;
        self.expect_symbol(')')?;

        let label_index = self.if_index;
        self.if_index += 1;
        let if_true = format!("IF_TRUE{}", label_index);
        let if_false = format!("IF_FALSE{}", label_index);

        self.writer.write_if_goto(&if_true)?;
        self.writer.write_goto(&if_false)?;
        self.writer.write_label(&if_true)?;

        self.tokens.advance()?;
        self.expect_symbol('{')?;
        self.tokens.advance()?;
        self.compile_statements()?;
        self.expect_symbol('}')?;
        self.tokens.advance()?;

        if self.at_keyword(Keyword::Else) {
            let if_end = format!("IF_END{}", label_index);
            self.writer.write_goto(&if_end)?;
            self.writer.write_label(&if_false)?;

            self.tokens.advance()?;
            self.expect_symbol('{')?;
            self.tokens.advance()?;
            self.compile_statements()?;
            self.expect_symbol('}')?;
            self.tokens.advance()?;

            self.writer.write_label(&if_end)?;
        } else {
            self.writer.write_label(&if_false)?;
        }

        Ok(())
    }

    /// `whileStmt`: `'while' '(' expression ')' '{' statement* '}'`
    fn compile_while(&mut self) -> JackResult<()> {
        self.expect_keyword(Keyword::While)?;

        let label_index = self.while_index;
        self.while_index += 1;
        let while_exp = format!("WHILE_EXP{}", label_index);
        let while_end = format!("WHILE_END{}", label_index);

        self.writer.write_label(&while_exp)?;

        self.tokens.advance()?;
        self.expect_symbol('(')?;
        self.tokens.advance()?;

        self.compile_expression()?;
        self.expect_symbol(')')?;

        // The loop exits when the condition does not hold.
        self.writer.write_arithmetic(Command::Not)?;
        self.writer.write_if_goto(&while_end)?;

        self.tokens.advance()?;
        self.expect_symbol('{')?;
        self.tokens.advance()?;

        self.compile_statements()?;

        self.writer.write_goto(&while_exp)?;
        self.expect_symbol('}')?;
        self.writer.write_label(&while_end)?;

        self.tokens.advance()?;
        Ok(())
    }

    /// `doStmt`: `'do' subroutineCall ';'`
    ///
    /// Every call leaves a return value on the stack; a `do`
    /// statement discards it.
    fn compile_do(&mut self) -> JackResult<()> {
        self.expect_keyword(Keyword::Do)?;
        self.tokens.advance()?;

        self.compile_subroutine_call()?;
        self.expect_symbol(';')?;
        self.writer.write_pop(Segment::Temp, 0)?;

        self.tokens.advance()?;
        Ok(())
    }

    /// `returnStmt`: `'return' expression? ';'`
    ///
    /// Void subroutines still return a value, so a bare `return`
    /// pushes constant 0.
    fn compile_return(&mut self) -> JackResult<()> {
        self.expect_keyword(Keyword::Return)?;
        self.tokens.advance()?;

        if self.at_symbol(';') {
            self.writer.write_push(Segment::Constant, 0)?;
        } else {
            self.compile_expression()?;
            self.expect_symbol(';')?;
        }

        self.writer.write_return()?;
        self.tokens.advance()?;
        Ok(())
    }

    /// `expression`: `term (op term)*`
    ///
    /// Strictly left-to-right; the only precedence is grammar
    /// position. `*` and `/` lower to OS calls.
    fn compile_expression(&mut self) -> JackResult<()> {
        self.compile_term()?;

        while let Some(op) = self.current_op() {
            self.tokens.advance()?;
            self.compile_term()?;

            match op {
                '*' => self.writer.write_call("Math.multiply", 2)?,
                '/' => self.writer.write_call("Math.divide", 2)?,
                _ => self.writer.write_arithmetic(binary_command(op))?,
            }
        }

        Ok(())
    }

    /// `term`: dispatches on the current token; see the grammar.
    fn compile_term(&mut self) -> JackResult<()> {
        if self.at_symbol('(') {
            self.tokens.advance()?;
            self.compile_expression()?;
            self.expect_symbol(')')?;
            self.tokens.advance()?;
            return Ok(());
        }

        if let Some(op) = self.current_unary_op() {
            self.tokens.advance()?;
            self.compile_term()?;
            let command = if op == '-' { Command::Neg } else { Command::Not };
            self.writer.write_arithmetic(command)?;
            return Ok(());
        }

        if let Some(value) = self.token().int_value() {
            self.writer.write_push(Segment::Constant, value)?;
            self.tokens.advance()?;
            return Ok(());
        }

        if let Some(text) = self.token().string_value() {
            let text = text.to_owned();
            self.writer.write_push(Segment::Constant, text.len() as u16)?;
            self.writer.write_call("String.new", 1)?;
            for c in text.chars() {
                self.writer.write_push(Segment::Constant, c as u16)?;
                self.writer.write_call("String.appendChar", 2)?;
            }
            self.tokens.advance()?;
            return Ok(());
        }

        if self.at_keyword_in(&KEYWORD_CONSTANTS) {
            match self.token().keyword() {
                Some(Keyword::True) => {
                    // True is all ones.
                    self.writer.write_push(Segment::Constant, 0)?;
                    self.writer.write_arithmetic(Command::Not)?;
                }
                Some(Keyword::False) | Some(Keyword::Null) => {
                    self.writer.write_push(Segment::Constant, 0)?;
                }
                _ => {
                    self.writer.write_push(Segment::Pointer, 0)?;
                }
            }
            self.tokens.advance()?;
            return Ok(());
        }

        if let Some(name) = self.token().identifier().cloned() {
            self.tokens.advance()?;

            if self.symbols.kind_of(&name) != SymbolKind::None {
                // varName, varName[expression] or a method call on
                // the named object.
                if self.at_symbol('[') {
                    self.tokens.advance()?;
                    self.compile_array_load(&name)?;
                } else if self.at_symbol('.') {
                    self.tokens.advance()?;
                    self.compile_foreign_method_call(&name)?;
                } else {
                    let (segment, index) = self.resolve_variable(&name)?;
                    self.writer.write_push(segment, index)?;
                }
            } else if self.at_symbol('.') {
                // A name that is not a variable must be a class name.
                self.tokens.advance()?;
                self.compile_function_call(&name)?;
            } else {
                self.compile_own_method_call(&name)?;
            }

            return Ok(());
        }

        Err(self.error("invalid term"))
    }

    /// `expressionList`: `( expression (',' expression)* )?`
    ///
    /// Returns the number of compiled expressions.
    fn compile_expression_list(&mut self) -> JackResult<u16> {
        let mut count = 0;

        if self.at_term() {
            self.compile_expression()?;
            count += 1;

            while self.at_symbol(',') {
                self.tokens.advance()?;
                self.compile_expression()?;
                count += 1;
            }
        }

        Ok(count)
    }

    /// `subroutineCall` as the target of a `do` statement.
    fn compile_subroutine_call(&mut self) -> JackResult<()> {
        let name = match self.token().identifier().cloned() {
            Some(name) => name,
            None => return Err(self.error("invalid subroutine call")),
        };
        self.tokens.advance()?;

        if self.symbols.kind_of(&name) == SymbolKind::None {
            // A name that is neither static, field, arg nor var must
            // be a subroutine name or a class name.
            if self.at_symbol('.') {
                self.tokens.advance()?;
                self.compile_function_call(&name)
            } else {
                self.compile_own_method_call(&name)
            }
        } else if self.at_symbol('.') {
            self.tokens.advance()?;
            self.compile_foreign_method_call(&name)
        } else {
            Err(self.error("invalid subroutine call"))
        }
    }

    /// `varName '[' expression ']'` in term position: leaves the
    /// element value on the stack.
    fn compile_array_load(&mut self, name: &SmolStr) -> JackResult<()> {
        self.compile_expression()?;
        self.expect_symbol(']')?;

        let (segment, index) = self.resolve_variable(name)?;
        self.writer.write_push(segment, index)?;
        self.writer.write_arithmetic(Command::Add)?;
        self.writer.write_pop(Segment::Pointer, 1)?;
        self.writer.write_push(Segment::That, 0)?;

        self.tokens.advance()?;
        Ok(())
    }

    /// `prefix.name(args)` where the prefix resolved to a variable:
    /// the receiver is pushed first and counted as an argument, and
    /// the call targets the receiver's declared type.
    fn compile_foreign_method_call(&mut self, prefix: &SmolStr) -> JackResult<()> {
        let method = self.expect_subroutine_name()?;
        self.tokens.advance()?;

        let (segment, index) = self.resolve_variable(prefix)?;
        self.writer.write_push(segment, index)?;

        self.expect_symbol('(')?;
        self.tokens.advance()?;
        let n_args = self.compile_expression_list()?;
        self.expect_symbol(')')?;

        let receiver_type = self
            .symbols
            .type_of(prefix)
            .cloned()
            .ok_or_else(|| self.error(format!("unknown variable '{}'", prefix)))?;
        self.writer
            .write_call(&format!("{}.{}", receiver_type, method), n_args + 1)?;

        self.tokens.advance()?;
        Ok(())
    }

    /// `prefix.name(args)` where the prefix is a bare class name:
    /// a static function or constructor call, no receiver.
    fn compile_function_call(&mut self, class_name: &SmolStr) -> JackResult<()> {
        let function = self.expect_subroutine_name()?;
        self.tokens.advance()?;

        self.expect_symbol('(')?;
        self.tokens.advance()?;
        let n_args = self.compile_expression_list()?;
        self.expect_symbol(')')?;

        self.writer
            .write_call(&format!("{}.{}", class_name, function), n_args)?;

        self.tokens.advance()?;
        Ok(())
    }

    /// `name(args)`: a method call on the current object. The
    /// receiver is passed by pushing `pointer 0`.
    fn compile_own_method_call(&mut self, method: &SmolStr) -> JackResult<()> {
        self.writer.write_push(Segment::Pointer, 0)?;

        self.expect_symbol('(')?;
        self.tokens.advance()?;
        let n_args = self.compile_expression_list()?;
        self.expect_symbol(')')?;

        self.writer
            .write_call(&format!("{}.{}", self.class_name, method), n_args + 1)?;

        self.tokens.advance()?;
        Ok(())
    }
}

/// Token predicates and expectations.
impl<R: BufRead, W: Write> CompilationEngine<R, W> {
    #[inline]
    fn token(&self) -> &Token {
        self.tokens.token()
    }

    fn at_class_var_dec(&self) -> bool {
        self.at_keyword_in(&[Keyword::Static, Keyword::Field])
    }

    fn at_subroutine_dec(&self) -> bool {
        self.at_keyword_in(&[Keyword::Constructor, Keyword::Function, Keyword::Method])
    }

    fn at_statement(&self) -> bool {
        self.at_keyword_in(&STATEMENT_KEYWORDS)
    }

    fn at_type(&self) -> bool {
        self.token().identifier().is_some()
            || self.at_keyword_in(&[Keyword::Int, Keyword::Char, Keyword::Boolean])
    }

    /// An identifier that does not resolve as a variable can only
    /// name a class.
    fn at_class_name(&self) -> bool {
        match self.token().identifier() {
            Some(name) => self.symbols.kind_of(name) == SymbolKind::None,
            None => false,
        }
    }

    fn at_term(&self) -> bool {
        match &self.token().kind {
            TokenKind::IntConst(_) | TokenKind::StringConst(_) | TokenKind::Identifier(_) => true,
            TokenKind::Keyword(keyword) => KEYWORD_CONSTANTS.contains(keyword),
            TokenKind::Symbol(symbol) => *symbol == '(' || UNARY_OPS.contains(symbol),
        }
    }

    fn at_symbol(&self, expected: char) -> bool {
        self.token().symbol() == Some(expected)
    }

    fn at_keyword(&self, expected: Keyword) -> bool {
        self.token().keyword() == Some(expected)
    }

    fn at_keyword_in(&self, expected: &[Keyword]) -> bool {
        match self.token().keyword() {
            Some(keyword) => expected.contains(&keyword),
            None => false,
        }
    }

    fn current_op(&self) -> Option<char> {
        self.token().symbol().filter(|symbol| OPS.contains(symbol))
    }

    fn current_unary_op(&self) -> Option<char> {
        self.token()
            .symbol()
            .filter(|symbol| UNARY_OPS.contains(symbol))
    }

    fn expect_symbol(&self, expected: char) -> JackResult<()> {
        if self.at_symbol(expected) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected symbol '{}', found {}",
                expected,
                self.token().kind
            )))
        }
    }

    fn expect_keyword(&self, expected: Keyword) -> JackResult<()> {
        if self.at_keyword(expected) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected keyword '{}', found {}",
                expected,
                self.token().kind
            )))
        }
    }

    fn expect_keyword_in(&self, expected: &[Keyword]) -> JackResult<Keyword> {
        match self.token().keyword() {
            Some(keyword) if expected.contains(&keyword) => Ok(keyword),
            _ => {
                let expected = expected.iter().map(|kw| format!("'{}'", kw)).join(", ");
                Err(self.error(format!(
                    "expected one of {}, found {}",
                    expected,
                    self.token().kind
                )))
            }
        }
    }

    fn expect_identifier(&self) -> JackResult<SmolStr> {
        match self.token().identifier() {
            Some(name) => Ok(name.clone()),
            None => Err(self.error(format!(
                "expected an identifier, found {}",
                self.token().kind
            ))),
        }
    }

    /// The class header identifier; must not resolve in any scope.
    fn expect_class_name_definition(&self) -> JackResult<SmolStr> {
        match self.token().identifier() {
            Some(name) if self.symbols.kind_of(name) == SymbolKind::None => Ok(name.clone()),
            _ => Err(self.error("invalid class definition")),
        }
    }

    /// A subroutine's name must not collide with a class variable.
    fn expect_subroutine_definition(&self) -> JackResult<SmolStr> {
        let name = self.expect_identifier()?;
        if self.symbols.kind_of(&name) != SymbolKind::None {
            return Err(self.error(format!(
                "subroutine '{}' shares its name with a static or field variable",
                name
            )));
        }
        Ok(name)
    }

    /// A called subroutine's name must not resolve as a variable.
    fn expect_subroutine_name(&self) -> JackResult<SmolStr> {
        let name = self.expect_identifier()?;
        if self.symbols.kind_of(&name) != SymbolKind::None {
            return Err(self.error(format!(
                "'{}' is a variable, expected a subroutine name",
                name
            )));
        }
        Ok(name)
    }

    /// `type`: `'int'|'char'|'boolean'|className`
    fn expect_type(&self) -> JackResult<SmolStr> {
        if let Some(keyword) = self.token().keyword() {
            if matches!(keyword, Keyword::Int | Keyword::Char | Keyword::Boolean) {
                return Ok(SmolStr::new(keyword.as_str()));
            }
        }
        if self.at_class_name() {
            return self.expect_identifier();
        }
        Err(self.error("invalid type"))
    }

    /// `'void'` or a `type`.
    fn expect_return_type(&self) -> JackResult<()> {
        let valid = self.at_keyword_in(&[
            Keyword::Void,
            Keyword::Int,
            Keyword::Char,
            Keyword::Boolean,
        ]) || self.at_class_name();

        if valid {
            Ok(())
        } else {
            Err(self.error("invalid subroutine return type"))
        }
    }

    /// Defines the current identifier token with the given kind and
    /// type, guarding against redefinition in the same scope.
    fn define_variable(&mut self, kind: SymbolKind, ty: &SmolStr) -> JackResult<()> {
        let name = self.expect_identifier()?;
        if self.symbols.kind_of(&name) == kind {
            return Err(self.error(format!(
                "redefinition of identifier '{}' in the same scope",
                name
            )));
        }
        self.symbols.define(name, ty.clone(), kind);
        Ok(())
    }

    /// Resolves a name to its VM storage location.
    fn resolve_variable(&self, name: &str) -> JackResult<(Segment, u16)> {
        let kind = self.symbols.kind_of(name);
        if kind == SymbolKind::None {
            return Err(self.error(format!("unknown variable '{}'", name)));
        }

        let index = self.symbols.index_of(name);
        debug_assert!(index >= 0, "resolved names carry an index");
        Ok((segment_of(kind), index as u16))
    }

    #[cold]
    #[inline(never)]
    fn error(&self, message: impl ToString) -> JackError {
        CompileError::new(self.tokens.current_line(), message).into()
    }
}

/// Storage kind to VM segment, applied uniformly to reads and
/// writes.
fn segment_of(kind: SymbolKind) -> Segment {
    match kind {
        SymbolKind::Static => Segment::Static,
        SymbolKind::Field => Segment::This,
        SymbolKind::Arg => Segment::Argument,
        SymbolKind::Var => Segment::Local,
        SymbolKind::None => unreachable!("resolved variables carry a concrete kind"),
    }
}

fn binary_command(op: char) -> Command {
    match op {
        '+' => Command::Add,
        '-' => Command::Sub,
        '&' => Command::And,
        '|' => Command::Or,
        '<' => Command::Lt,
        '>' => Command::Gt,
        '=' => Command::Eq,
        _ => unreachable!("'*' and '/' lower to OS calls"),
    }
}

#[cfg(test)]
mod test {
    use crate::compile_to_string;

    fn compile(source: &str) -> String {
        match compile_to_string(source) {
            Ok(vm) => vm,
            Err(err) => panic!("{}", err),
        }
    }

    fn compile_err(source: &str) -> String {
        match compile_to_string(source) {
            Ok(vm) => panic!("expected a compile error, got:\n{}", vm),
            Err(err) => err.to_string(),
        }
    }

    #[test]
    fn test_empty_class() {
        assert_eq!(compile("class A {}"), "");
    }

    #[test]
    fn test_function_returning_constant() {
        let vm = compile("class A { function int one() { return 1; } }");
        assert_eq!(vm, "function A.one 0\npush constant 1\nreturn\n");
    }

    #[test]
    fn test_void_return_pushes_zero() {
        let vm = compile("class A { function void nop() { return; } }");
        assert_eq!(vm, "function A.nop 0\npush constant 0\nreturn\n");
    }

    #[test]
    fn test_string_constant() {
        let vm = compile("class A { function String greet() { return \"Hi\"; } }");
        let expected = "\
function A.greet 0
push constant 2
call String.new 1
push constant 72
call String.appendChar 2
push constant 105
call String.appendChar 2
return
";
        assert_eq!(vm, expected);
    }

    #[test]
    fn test_keyword_constants() {
        let vm = compile(
            "class A { function boolean flags() { var boolean b; let b = true; let b = false; let b = null; return this; } }",
        );
        let expected = "\
function A.flags 1
push constant 0
not
pop local 0
push constant 0
pop local 0
push constant 0
pop local 0
push pointer 0
return
";
        assert_eq!(vm, expected);
    }

    #[test]
    fn test_if_else_labels() {
        let vm = compile(
            "class A { function void branch(int x) { var int y; if (x = 0) { let y = 1; } else { let y = 2; } return; } }",
        );
        let expected = "\
function A.branch 1
push argument 0
push constant 0
eq
if-goto IF_TRUE0
goto IF_FALSE0
label IF_TRUE0
push constant 1
pop local 0
goto IF_END0
label IF_FALSE0
push constant 2
pop local 0
label IF_END0
push constant 0
return
";
        assert_eq!(vm, expected);
    }

    #[test]
    fn test_if_without_else_has_no_end_label() {
        let vm = compile(
            "class A { function int clamp(int x) { if (x < 0) { return 0; } return x; } }",
        );
        let expected = "\
function A.clamp 0
push argument 0
push constant 0
lt
if-goto IF_TRUE0
goto IF_FALSE0
label IF_TRUE0
push constant 0
return
label IF_FALSE0
push argument 0
return
";
        assert_eq!(vm, expected);
    }

    #[test]
    fn test_while_loop() {
        let vm = compile(
            "class A { function int count() { var int x; let x = 0; while (x < 10) { let x = x + 1; } return x; } }",
        );
        let expected = "\
function A.count 1
push constant 0
pop local 0
label WHILE_EXP0
push local 0
push constant 10
lt
not
if-goto WHILE_END0
push local 0
push constant 1
add
pop local 0
goto WHILE_EXP0
label WHILE_END0
push local 0
return
";
        assert_eq!(vm, expected);
    }

    #[test]
    fn test_label_counters_reset_per_subroutine() {
        let vm = compile(
            "class A {
                function void a() { while (true) { } return; }
                function void b() { while (false) { } return; }
            }",
        );
        let expected = "\
function A.a 0
label WHILE_EXP0
push constant 0
not
not
if-goto WHILE_END0
goto WHILE_EXP0
label WHILE_END0
push constant 0
return
function A.b 0
label WHILE_EXP0
push constant 0
not
if-goto WHILE_END0
goto WHILE_EXP0
label WHILE_END0
push constant 0
return
";
        assert_eq!(vm, expected);
    }

    #[test]
    fn test_array_store() {
        let vm = compile(
            "class A { function void shift(Array a, int i, int j) { let a[i] = a[j] + 1; return; } }",
        );
        let expected = "\
function A.shift 0
push argument 1
push argument 0
add
push argument 2
push argument 0
add
pop pointer 1
push that 0
push constant 1
add
pop temp 0
pop pointer 1
push temp 0
pop that 0
push constant 0
return
";
        assert_eq!(vm, expected);
    }

    #[test]
    fn test_method_prologue() {
        let vm = compile("class A { method int value() { return 1; } }");
        let expected = "\
function A.value 0
push argument 0
pop pointer 0
push constant 1
return
";
        assert_eq!(vm, expected);
    }

    #[test]
    fn test_method_parameters_start_at_argument_one() {
        let vm = compile("class A { method int same(int x) { return x; } }");
        let expected = "\
function A.same 0
push argument 0
pop pointer 0
push argument 1
return
";
        assert_eq!(vm, expected);
    }

    #[test]
    fn test_constructor_prologue_counts_fields() {
        let vm = compile(
            "class A { field int x, y; field boolean alive; constructor A new() { return this; } }",
        );
        let expected = "\
function A.new 0
push constant 3
call Memory.alloc 1
pop pointer 0
push pointer 0
return
";
        assert_eq!(vm, expected);
    }

    #[test]
    fn test_operators_are_left_associative() {
        // 2 + 3 * 4 evaluates as (2 + 3) * 4; grammar position is
        // the only precedence.
        let vm = compile("class A { function int calc() { return 2 + 3 * 4; } }");
        let expected = "\
function A.calc 0
push constant 2
push constant 3
add
push constant 4
call Math.multiply 2
return
";
        assert_eq!(vm, expected);
    }

    #[test]
    fn test_unary_operators() {
        let vm = compile("class A { function int calc(int x) { return -x + ~x; } }");
        let expected = "\
function A.calc 0
push argument 0
neg
push argument 0
not
add
return
";
        assert_eq!(vm, expected);
    }

    #[test]
    fn test_call_dispatch_forms() {
        let vm = compile(
            "class A {
                field A peer;
                method void run() {
                    do Output.printInt(7);
                    do peer.run();
                    do helper(1, 2);
                    return;
                }
                method void helper(int a, int b) { return; }
            }",
        );
        let expected = "\
function A.run 0
push argument 0
pop pointer 0
push constant 7
call Output.printInt 1
pop temp 0
push this 0
call A.run 1
pop temp 0
push pointer 0
push constant 1
push constant 2
call A.helper 3
pop temp 0
push constant 0
return
function A.helper 0
push argument 0
pop pointer 0
push constant 0
return
";
        assert_eq!(vm, expected);
    }

    #[test]
    fn test_statics_and_fields_map_to_segments() {
        let vm = compile(
            "class A {
                static int total;
                field int value;
                method void sync() { let total = value; return; }
            }",
        );
        let expected = "\
function A.sync 0
push argument 0
pop pointer 0
push this 0
pop static 0
push constant 0
return
";
        assert_eq!(vm, expected);
    }

    #[test]
    fn test_trailing_tokens_after_class() {
        let message = compile_err("class A {} class B {}");
        assert_eq!(
            message,
            "Error on line 1: trailing tokens after the end of the class definition"
        );
    }

    #[test]
    fn test_redefinition_in_same_scope() {
        let message = compile_err("class A { function void f() { var int x; var int x; return; } }");
        assert!(message.contains("redefinition of identifier 'x'"));
    }

    #[test]
    fn test_unknown_variable_in_let() {
        let message = compile_err("class A { function void f() { let x = 1; return; } }");
        assert!(message.contains("unknown variable 'x'"));
    }

    #[test]
    fn test_variable_used_as_type() {
        let message =
            compile_err("class A { static int t; function void f(t other) { return; } }");
        assert!(message.contains("invalid type"));
    }

    #[test]
    fn test_wrong_symbol_is_line_numbered() {
        let message = compile_err("class A {\n  function void f() { return; )\n}");
        assert_eq!(message, "Error on line 2: expected symbol '}', found symbol ')'");
    }

    #[test]
    fn test_missing_class_keyword() {
        let message = compile_err("klass A {}");
        assert!(message.contains("expected keyword 'class'"));
    }

    #[test]
    fn test_unexpected_end_of_input() {
        let message = compile_err("class A {");
        assert!(message.contains("unexpected end of input"));
    }

    #[test]
    fn test_do_call_on_variable_requires_method() {
        let message =
            compile_err("class A { function void f() { var int x; do x(); return; } }");
        assert!(message.contains("invalid subroutine call"));
    }
}
