use super::parser_utils::*;
use super::IngestError;
use std::collections::HashMap;

pub type ElementIdx = usize;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElementKind {
    Station,
    Section,
}

#[derive(Clone, Debug)]
pub struct Element {
    pub name: String,
    pub kind: ElementKind,
    pub length: f64,
    pub capacity: usize,
}

impl Element {
    /// Trains can pass or wait for each other here.
    pub fn is_refuge(&self) -> bool {
        self.capacity > 1
    }

    pub fn is_section(&self) -> bool {
        self.kind == ElementKind::Section
    }
}

/// The corridor as an array of elements in route order; an element's
/// index is its route position.
#[derive(Clone, Debug)]
pub struct Track {
    pub elements: Vec<Element>,
    pub names: HashMap<String, ElementIdx>,
}

impl Track {
    pub fn new(elements: Vec<Element>) -> Result<Track, IngestError> {
        if elements.len() < 2 {
            return Err(IngestError::RouteTooShort(elements.len()));
        }
        let mut names = HashMap::new();
        for (idx, e) in elements.iter().enumerate() {
            if names.insert(e.name.clone(), idx).is_some() {
                return Err(IngestError::Duplicate(e.name.clone()));
            }
            if e.capacity == 0 {
                return Err(IngestError::ZeroCapacity(e.name.clone()));
            }
            let bad_length = match e.kind {
                ElementKind::Section => !(e.length > 0.0),
                ElementKind::Station => !(e.length >= 0.0),
            };
            if bad_length {
                return Err(IngestError::BadLength(e.name.clone(), e.length));
            }
        }
        Ok(Track { elements, names })
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn lookup(&self, name: &str) -> Option<ElementIdx> {
        self.names.get(name).cloned()
    }

    pub fn name(&self, idx: ElementIdx) -> &str {
        &self.elements[idx].name
    }

    pub fn sections(&self) -> impl Iterator<Item = (ElementIdx, &Element)> {
        self.elements.iter().enumerate().filter(|(_, e)| e.is_section())
    }

    pub fn total_section_length(&self) -> f64 {
        self.sections().map(|(_, e)| e.length).sum()
    }
}

#[derive(Debug, Clone)]
pub enum Statement {
    Route(Vec<String>),
    Element {
        name: String,
        kind: ElementKind,
        length: Option<f64>,
        capacity: Option<usize>,
    },
}

/// Parses the track file format:
///
/// ```text
/// route [ A, S1, B ]
/// station A { length 300 capacity 2 }
/// section S1 { length 1000 }
/// ```
pub fn parse(t: &[Token]) -> Result<Vec<Statement>, ParseError> {
    let mut i = 0;
    let mut stmts = Vec::new();
    while t[i] != Token::EOF {
        stmts.push(statement(&mut i, t)?);
    }
    Ok(stmts)
}

fn statement(i: &mut usize, t: &[Token]) -> Result<Statement, ParseError> {
    alt(i, t, &[&|i, t| {
              symbol(i, t, "route")?;
              Ok(Statement::Route(list(i, t, identifier)?))
          },
          &|i, t| {
              symbol(i, t, "station")?;
              element(i, t, ElementKind::Station)
          },
          &|i, t| {
              symbol(i, t, "section")?;
              element(i, t, ElementKind::Section)
          }])
}

fn element(i: &mut usize, t: &[Token], kind: ElementKind) -> Result<Statement, ParseError> {
    let name = identifier(i, t)?;
    let mut length = None;
    let mut capacity = None;
    must_match(i, t, Token::BraceOpen)?;
    while !matches(i, t, Token::BraceClose) {
        let key = identifier(i, t)?;
        match key.as_str() {
            "length" => length = Some(number(i, t)?),
            "capacity" => capacity = Some(number(i, t)? as usize),
            _ => return Err(ParseError::UnexpectedToken(*i - 1, key)),
        }
    }
    Ok(Statement::Element { name, kind, length, capacity })
}

pub fn model_from_ast(stmts: &[Statement]) -> Result<Track, IngestError> {
    let mut route = None;
    let mut defs = HashMap::new();
    for stmt in stmts {
        match *stmt {
            Statement::Route(ref names) => route = Some(names.clone()),
            Statement::Element { ref name, kind, length, capacity } => {
                let element = Element {
                    name: name.clone(),
                    kind,
                    length: length.unwrap_or(0.0),
                    capacity: capacity.unwrap_or(1),
                };
                if defs.insert(name.clone(), element).is_some() {
                    return Err(IngestError::Duplicate(name.clone()));
                }
            }
        }
    }

    let route = route.ok_or(IngestError::NoRoute)?;
    let mut elements = Vec::with_capacity(route.len());
    for name in &route {
        match defs.remove(name) {
            Some(e) => elements.push(e),
            None if route.iter().filter(|n| *n == name).count() > 1 => {
                return Err(IngestError::Duplicate(name.clone()))
            }
            None => return Err(IngestError::Undefined(name.clone())),
        }
    }
    if let Some(name) = defs.keys().min() {
        return Err(IngestError::NotOnRoute(name.clone()));
    }
    Track::new(elements)
}
