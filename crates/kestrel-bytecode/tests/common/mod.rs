//! Shared helpers for the integration tests: AST builders and a small
//! reference interpreter that executes compiled units.

#![allow(dead_code)]

use std::collections::HashMap;

use kestrel_bytecode::ast::*;
use kestrel_bytecode::{CompilationUnit, Instruction, OpCode, Operand, PredefinedError};

// ============================================================================
// AST builders
// ============================================================================

pub fn num(n: f64) -> Expression {
    Expression::Literal(Literal::Number(n))
}

pub fn string(s: &str) -> Expression {
    Expression::Literal(Literal::String(s.to_string()))
}

pub fn boolean(b: bool) -> Expression {
    Expression::Literal(Literal::Boolean(b))
}

pub fn ident(name: &str) -> Expression {
    Expression::Identifier(Identifier::new(name))
}

pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary(BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn logical(operator: LogicalOperator, left: Expression, right: Expression) -> Expression {
    Expression::Logical(LogicalExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn assign(operator: AssignmentOperator, left: Expression, right: Expression) -> Expression {
    Expression::Assignment(AssignmentExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn member(object: Expression, name: &str) -> Expression {
    Expression::Member(MemberExpression {
        object: Box::new(object),
        property: MemberProperty::Identifier(Identifier::new(name)),
    })
}

pub fn call(callee: Expression, arguments: Vec<Expression>) -> Expression {
    Expression::Call(CallExpression {
        callee: Box::new(callee),
        arguments,
    })
}

pub fn postfix(operator: UpdateOperator, argument: Expression) -> Expression {
    Expression::Update(UpdateExpression {
        operator,
        argument: Box::new(argument),
        prefix: false,
    })
}

pub fn conditional(test: Expression, consequent: Expression, alternate: Expression) -> Expression {
    Expression::Conditional(ConditionalExpression {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
    })
}

pub fn object(properties: Vec<(&str, Expression)>) -> Expression {
    Expression::Object(ObjectExpression {
        properties: properties
            .into_iter()
            .map(|(key, value)| Property {
                key: PropertyKey::Identifier(Identifier::new(key)),
                value,
            })
            .collect(),
    })
}

pub fn expr_stmt(expression: Expression) -> Statement {
    Statement::Expression(ExpressionStatement { expression })
}

pub fn var(name: &str, init: Expression) -> Statement {
    Statement::VariableDeclaration(VariableDeclaration {
        declarations: vec![VariableDeclarator {
            id: Identifier::new(name),
            init: Some(init),
        }],
    })
}

pub fn block(body: Vec<Statement>) -> Statement {
    Statement::Block(BlockStatement { body })
}

pub fn while_loop(test: Expression, body: Statement) -> Statement {
    Statement::While(WhileStatement {
        test,
        body: Box::new(body),
    })
}

// ============================================================================
// Reference interpreter
// ============================================================================

/// Run-time values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Object(usize),
    Native(usize),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) | Value::Native(_) => true,
        }
    }

    fn number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Null => 0.0,
            Value::Str(s) => s.parse().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }

    fn key(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => format!("{other:?}"),
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null | Value::Object(_) => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Native(_) => "function",
        }
    }
}

#[derive(Debug, Clone)]
enum Reference {
    Name(String),
    Property(usize, String),
}

#[derive(Debug, Clone)]
enum Slot {
    Value(Value),
    Ref(Reference),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Returned(Value),
    Threw(PredefinedError),
    ReferenceError(String),
    Escaped(&'static str),
}

type Native = Box<dyn FnMut(&[Value]) -> Value>;

const STEP_LIMIT: usize = 100_000;

/// Executes compiled units against one global environment.
pub struct Interpreter {
    pub globals: HashMap<String, Value>,
    objects: Vec<HashMap<String, Value>>,
    natives: Vec<Native>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self {
            globals: HashMap::new(),
            objects: Vec::new(),
            natives: Vec::new(),
        }
    }

    /// Binds a host function to a global name.
    pub fn define_native(&mut self, name: &str, f: impl FnMut(&[Value]) -> Value + 'static) {
        self.natives.push(Box::new(f));
        self.globals
            .insert(name.to_string(), Value::Native(self.natives.len() - 1));
    }

    /// Reads a property of an object value.
    pub fn property(&self, value: &Value, key: &str) -> Value {
        match value {
            Value::Object(id) => self.objects[*id].get(key).cloned().unwrap_or(Value::Undefined),
            _ => Value::Undefined,
        }
    }

    /// Runs the entry point at `start` until it returns, throws or escapes.
    ///
    /// Panics if a `Return` sees anything but exactly one value.
    pub fn run(&mut self, unit: &CompilationUnit<'_>, start: usize) -> Outcome {
        let code = unit.instructions();
        let mut stack: Vec<Slot> = Vec::new();
        let mut pc = start;

        for _ in 0..STEP_LIMIT {
            let inst = &code[pc];
            pc += 1;
            match inst.opcode {
                OpCode::PushUndefined => stack.push(Slot::Value(Value::Undefined)),
                OpCode::PushNull => stack.push(Slot::Value(Value::Null)),
                OpCode::PushTrue => stack.push(Slot::Value(Value::Bool(true))),
                OpCode::PushFalse => stack.push(Slot::Value(Value::Bool(false))),
                OpCode::PushThis => stack.push(Slot::Value(Value::Undefined)),
                OpCode::PushNumber => match inst.operand {
                    Some(Operand::Number(n)) => stack.push(Slot::Value(Value::Number(n))),
                    ref other => panic!("bad push_number operand {other:?}"),
                },
                OpCode::PushString => match inst.operand {
                    Some(Operand::Raw(s)) => stack.push(Slot::Value(Value::Str(s.to_string()))),
                    ref other => panic!("bad push_string operand {other:?}"),
                },
                OpCode::PushName => {
                    let name = name_operand(unit, inst);
                    stack.push(Slot::Value(Value::Str(name)));
                }
                OpCode::Pop => {
                    stack.pop().expect("pop on empty stack");
                }
                OpCode::LoadName => {
                    let name = name_operand(unit, inst);
                    match self.globals.get(&name) {
                        Some(value) => stack.push(Slot::Value(value.clone())),
                        None => return Outcome::ReferenceError(name),
                    }
                }
                OpCode::StoreVar => {
                    let name = name_operand(unit, inst);
                    let value = self.pop_value(&mut stack);
                    self.globals.insert(name, value);
                }
                OpCode::ResolveName => {
                    let name = name_operand(unit, inst);
                    stack.push(Slot::Ref(Reference::Name(name)));
                }
                OpCode::ResolveIndex => {
                    let key = self.pop_value(&mut stack).key();
                    match self.pop_value(&mut stack) {
                        Value::Object(id) => stack.push(Slot::Ref(Reference::Property(id, key))),
                        other => panic!("property reference on {other:?}"),
                    }
                }
                OpCode::Deref => {
                    let value = match stack.last() {
                        Some(Slot::Ref(reference)) => match self.read(reference) {
                            Ok(value) => value,
                            Err(name) => return Outcome::ReferenceError(name),
                        },
                        other => panic!("deref of {other:?}"),
                    };
                    stack.push(Slot::Value(value));
                }
                OpCode::Assign => {
                    let value = self.pop_value(&mut stack);
                    let reference = pop_ref(&mut stack);
                    self.write(&reference, value.clone());
                    stack.push(Slot::Value(value));
                }
                OpCode::GetMember => {
                    let name = name_operand(unit, inst);
                    let object = self.pop_value(&mut stack);
                    stack.push(Slot::Value(self.property(&object, &name)));
                }
                OpCode::GetIndex => {
                    let key = self.pop_value(&mut stack).key();
                    let object = self.pop_value(&mut stack);
                    stack.push(Slot::Value(self.property(&object, &key)));
                }
                OpCode::SetProperty => {
                    let name = name_operand(unit, inst);
                    let value = self.pop_value(&mut stack);
                    match stack.last() {
                        Some(Slot::Value(Value::Object(id))) => {
                            self.objects[*id].insert(name, value);
                        }
                        other => panic!("set_property on {other:?}"),
                    }
                }
                OpCode::NewObject => {
                    self.objects.push(HashMap::new());
                    stack.push(Slot::Value(Value::Object(self.objects.len() - 1)));
                }
                OpCode::NewArray => {
                    let count = count_operand(inst);
                    let mut elements = HashMap::new();
                    let base = stack.len() - count;
                    for (i, slot) in stack.drain(base..).enumerate() {
                        let Slot::Value(value) = slot else {
                            panic!("reference in array literal");
                        };
                        elements.insert(i.to_string(), value);
                    }
                    elements.insert("length".to_string(), Value::Number(count as f64));
                    self.objects.push(elements);
                    stack.push(Slot::Value(Value::Object(self.objects.len() - 1)));
                }
                OpCode::Add => {
                    let right = self.pop_value(&mut stack);
                    let left = self.pop_value(&mut stack);
                    let result = match (&left, &right) {
                        (Value::Str(a), b) => Value::Str(format!("{a}{}", b.key())),
                        (a, Value::Str(b)) => Value::Str(format!("{}{b}", a.key())),
                        (a, b) => Value::Number(a.number() + b.number()),
                    };
                    stack.push(Slot::Value(result));
                }
                OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Mod => {
                    let right = self.pop_value(&mut stack).number();
                    let left = self.pop_value(&mut stack).number();
                    let result = match inst.opcode {
                        OpCode::Sub => left - right,
                        OpCode::Mul => left * right,
                        OpCode::Div => left / right,
                        _ => left % right,
                    };
                    stack.push(Slot::Value(Value::Number(result)));
                }
                OpCode::Lt | OpCode::Le | OpCode::Gt | OpCode::Ge => {
                    let right = self.pop_value(&mut stack).number();
                    let left = self.pop_value(&mut stack).number();
                    let result = match inst.opcode {
                        OpCode::Lt => left < right,
                        OpCode::Le => left <= right,
                        OpCode::Gt => left > right,
                        _ => left >= right,
                    };
                    stack.push(Slot::Value(Value::Bool(result)));
                }
                OpCode::Eq | OpCode::StrictEq | OpCode::Ne | OpCode::StrictNe => {
                    let right = self.pop_value(&mut stack);
                    let left = self.pop_value(&mut stack);
                    let equal = left == right;
                    let result = matches!(inst.opcode, OpCode::Eq | OpCode::StrictEq) == equal;
                    stack.push(Slot::Value(Value::Bool(result)));
                }
                OpCode::Not => {
                    let value = self.pop_value(&mut stack);
                    stack.push(Slot::Value(Value::Bool(!value.truthy())));
                }
                OpCode::Neg => {
                    let value = self.pop_value(&mut stack);
                    stack.push(Slot::Value(Value::Number(-value.number())));
                }
                OpCode::TypeOf => {
                    let value = self.pop_value(&mut stack);
                    stack.push(Slot::Value(Value::Str(value.type_name().to_string())));
                }
                OpCode::TypeOfRef => {
                    let reference = pop_ref(&mut stack);
                    let value = self.read(&reference).unwrap_or(Value::Undefined);
                    stack.push(Slot::Value(Value::Str(value.type_name().to_string())));
                }
                OpCode::PreInc | OpCode::PreDec | OpCode::PostInc | OpCode::PostDec => {
                    let reference = pop_ref(&mut stack);
                    let old = match self.read(&reference) {
                        Ok(value) => value.number(),
                        Err(name) => return Outcome::ReferenceError(name),
                    };
                    let delta = match inst.opcode {
                        OpCode::PreInc | OpCode::PostInc => 1.0,
                        _ => -1.0,
                    };
                    self.write(&reference, Value::Number(old + delta));
                    let result = match inst.opcode {
                        OpCode::PreInc | OpCode::PreDec => old + delta,
                        _ => old,
                    };
                    stack.push(Slot::Value(Value::Number(result)));
                }
                OpCode::Jump => pc = jump_operand(inst),
                OpCode::JumpIfFalse => {
                    if !self.pop_value(&mut stack).truthy() {
                        pc = jump_operand(inst);
                    }
                }
                OpCode::JumpIfFalseOrPop | OpCode::JumpIfTrueOrPop => {
                    let truthy = match stack.last() {
                        Some(Slot::Value(value)) => value.truthy(),
                        other => panic!("conditional jump on {other:?}"),
                    };
                    if truthy == (inst.opcode == OpCode::JumpIfTrueOrPop) {
                        pc = jump_operand(inst);
                    } else {
                        stack.pop();
                    }
                }
                OpCode::Call | OpCode::CallRef => {
                    let argc = count_operand(inst);
                    let base = stack.len() - argc;
                    let args: Vec<Value> = stack
                        .drain(base..)
                        .map(|slot| match slot {
                            Slot::Value(value) => value,
                            Slot::Ref(_) => panic!("reference passed as argument"),
                        })
                        .collect();
                    let callee = match stack.pop() {
                        Some(Slot::Value(value)) => value,
                        Some(Slot::Ref(reference)) => match self.read(&reference) {
                            Ok(value) => value,
                            Err(name) => return Outcome::ReferenceError(name),
                        },
                        None => panic!("call with empty stack"),
                    };
                    let Value::Native(id) = callee else {
                        panic!("call of non-function {callee:?}");
                    };
                    let result = (self.natives[id])(&args);
                    stack.push(Slot::Value(result));
                }
                OpCode::Escape => match inst.operand {
                    Some(Operand::Statement(stmt)) => return Outcome::Escaped(stmt.kind_name()),
                    ref other => panic!("bad escape operand {other:?}"),
                },
                OpCode::ThrowError => match inst.operand {
                    Some(Operand::Error(error)) => return Outcome::Threw(error),
                    ref other => panic!("bad throw_error operand {other:?}"),
                },
                OpCode::Return => {
                    assert_eq!(stack.len(), 1, "return must see exactly one value");
                    return Outcome::Returned(self.pop_value(&mut stack));
                }
                other => panic!("reference interpreter does not support {other}"),
            }
        }
        panic!("step limit exceeded");
    }

    fn pop_value(&self, stack: &mut Vec<Slot>) -> Value {
        match stack.pop() {
            Some(Slot::Value(value)) => value,
            other => panic!("expected a value, found {other:?}"),
        }
    }

    fn read(&self, reference: &Reference) -> Result<Value, String> {
        match reference {
            Reference::Name(name) => self.globals.get(name).cloned().ok_or_else(|| name.clone()),
            Reference::Property(id, key) => {
                Ok(self.objects[*id].get(key).cloned().unwrap_or(Value::Undefined))
            }
        }
    }

    fn write(&mut self, reference: &Reference, value: Value) {
        match reference {
            Reference::Name(name) => {
                self.globals.insert(name.clone(), value);
            }
            Reference::Property(id, key) => {
                self.objects[*id].insert(key.clone(), value);
            }
        }
    }
}

fn pop_ref(stack: &mut Vec<Slot>) -> Reference {
    match stack.pop() {
        Some(Slot::Ref(reference)) => reference,
        other => panic!("expected a reference, found {other:?}"),
    }
}

fn name_operand(unit: &CompilationUnit<'_>, inst: &Instruction<'_>) -> String {
    match inst.operand {
        Some(Operand::Name(handle)) => unit.name(handle).expect("dangling name").to_string(),
        ref other => panic!("expected a name operand, got {other:?}"),
    }
}

fn count_operand(inst: &Instruction<'_>) -> usize {
    match inst.operand {
        Some(Operand::Count(n)) => n as usize,
        ref other => panic!("expected a count operand, got {other:?}"),
    }
}

fn jump_operand(inst: &Instruction<'_>) -> usize {
    inst.jump_target().expect("unpatched jump")
}
