//! Testing utilities for expando workspace
//!
//! Shared fixture schemas, graph builders and tracing setup.

#![allow(missing_docs)]

use std::sync::Arc;

use expando_model::{
    FieldType, KeyKind, MapKey, ObjectGraph, ObjectId, Scalar, TerminalKind, TypeKey, TypeKind,
    TypeRegistry, Value,
};
use indexmap::IndexMap;
use rust_decimal::Decimal;

/// Install a test subscriber honouring `RUST_LOG`; repeated calls are harmless
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Person schema: self-referencing, with lists and maps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PersonTypes {
    pub registry: Arc<TypeRegistry>,
    pub person: TypeKey,
    pub pet: TypeKey,
    pub mood: TypeKey,
}

/// `Person { Name, Age, Mood, BestFriend, Friends, Nicknames, Scores, Labels, Pets, Badge }`
///
/// `Pet` has no parameterless constructor; `Badge` is read-only.
pub fn person_types() -> PersonTypes {
    let mut registry = TypeRegistry::new();
    let mood = registry
        .enumeration("People.Mood", &["Neutral", "Happy", "Grumpy"])
        .unwrap();
    let pet = registry
        .composite("People.Pet")
        .unwrap()
        .field("Name", FieldType::text())
        .without_default_constructor()
        .finish()
        .unwrap();
    let person = registry.declare("People.Person", TypeKind::Composite).unwrap();
    registry
        .define(person)
        .unwrap()
        .field("Name", FieldType::text())
        .field("Age", FieldType::terminal(TerminalKind::I32))
        .field("Mood", FieldType::enumeration(mood))
        .field("BestFriend", FieldType::composite(person))
        .field("Friends", FieldType::list(FieldType::composite(person)))
        .field("Nicknames", FieldType::list(FieldType::text()))
        .field(
            "Scores",
            FieldType::keyed_map(KeyKind::Int, FieldType::terminal(TerminalKind::F64)),
        )
        .field("Labels", FieldType::map(FieldType::text()))
        .field("Pets", FieldType::list(FieldType::composite(pet)))
        .read_only("Badge", FieldType::text())
        .finish()
        .unwrap();

    PersonTypes {
        registry: Arc::new(registry),
        person,
        pet,
        mood,
    }
}

/// New person with a name and age
pub fn person(graph: &mut ObjectGraph, types: &PersonTypes, name: &str, age: i64) -> ObjectId {
    let id = graph.instantiate(types.person).unwrap();
    graph.set_by_name(id, "Name", Value::from(name)).unwrap();
    graph.set_by_name(id, "Age", Value::from(age)).unwrap();
    id
}

/// `A.BestFriend = B; B.BestFriend = A`
pub fn best_friends() -> (PersonTypes, ObjectGraph, ObjectId, ObjectId) {
    let types = person_types();
    let mut graph = ObjectGraph::new(Arc::clone(&types.registry));
    let a = person(&mut graph, &types, "Ann", 31);
    let b = person(&mut graph, &types, "Bob", 29);
    graph.set_by_name(a, "BestFriend", Value::Object(b)).unwrap();
    graph.set_by_name(b, "BestFriend", Value::Object(a)).unwrap();
    (types, graph, a, b)
}

/// Person with nicknames, scores and labels filled in
pub fn rich_person(graph: &mut ObjectGraph, types: &PersonTypes) -> ObjectId {
    let id = person(graph, types, "Cleo", 44);
    graph
        .set_by_name(id, "Nicknames", Value::Seq(vec!["C".into(), "Clee".into()]))
        .unwrap();

    let scores = indexmap_of([
        (MapKey::Int(1), Value::Scalar(Scalar::Float(9.5))),
        (MapKey::Int(2), Value::Scalar(Scalar::Float(7.0))),
    ]);
    graph.set_by_name(id, "Scores", Value::Map(scores)).unwrap();

    let labels = indexmap_of([(MapKey::text("team"), Value::from("blue"))]);
    graph.set_by_name(id, "Labels", Value::Map(labels)).unwrap();
    id
}

fn indexmap_of<const N: usize>(entries: [(MapKey, Value); N]) -> IndexMap<MapKey, Value> {
    entries.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Invoice schema: acyclic document with nested groups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct InvoiceTypes {
    pub registry: Arc<TypeRegistry>,
    pub language: TypeKey,
    pub code: TypeKey,
    pub id: TypeKey,
    pub date_and_time: TypeKey,
    pub block_string: TypeKey,
    pub note: TypeKey,
    pub line_item: TypeKey,
    pub document_reference: TypeKey,
    pub related_invoice: TypeKey,
    pub evidence: TypeKey,
    pub trade_transaction: TypeKey,
    pub invoice_document: TypeKey,
    pub root: TypeKey,
}

/// Invoice document schema rooted at `Qiif.QiifDataObject`
pub fn invoice_types() -> InvoiceTypes {
    let mut r = TypeRegistry::new();
    let language = r
        .enumeration("Qiif.Language", &["Undefined", "Cs", "En", "De"])
        .unwrap();
    let code = r
        .composite("Qiif.Code")
        .unwrap()
        .field("Identifier", FieldType::text())
        .finish()
        .unwrap();
    let id = r
        .composite("Qiif.Id")
        .unwrap()
        .field("Value", FieldType::text())
        .field("SchemeId", FieldType::text())
        .finish()
        .unwrap();
    let date_and_time = r
        .composite("Qiif.DateAndTime")
        .unwrap()
        .field("Date", FieldType::text())
        .field("Time", FieldType::text())
        .field("TimeOffset", FieldType::text())
        .finish()
        .unwrap();
    let block_string = r
        .composite("Qiif.LanguageBlockString")
        .unwrap()
        .field("Language", FieldType::enumeration(language))
        .field("Text", FieldType::text())
        .finish()
        .unwrap();
    let note = r
        .composite("Qiif.Note")
        .unwrap()
        .field("Content", FieldType::text())
        .field("SubjectCode", FieldType::composite(code))
        .finish()
        .unwrap();
    let line_item = r
        .composite("Qiif.LineItem")
        .unwrap()
        .field("Description", FieldType::composite(block_string))
        .field("LineId", FieldType::composite(id))
        .field("OriginCountryCode", FieldType::composite(code))
        .field("Quantity", FieldType::nullable(TerminalKind::Decimal))
        .field("Tags", FieldType::list(FieldType::text()))
        .finish()
        .unwrap();
    let document_reference = r
        .composite("Qiif.DocumentReference")
        .unwrap()
        .field("DocumentId", FieldType::composite(id))
        .field("Iri", FieldType::text())
        .finish()
        .unwrap();
    let related_invoice = r
        .composite("Qiif.RelatedInvoice")
        .unwrap()
        .field("Date", FieldType::composite(date_and_time))
        .field("Description", FieldType::composite(block_string))
        .field("DocumentId", FieldType::composite(id))
        .field("Iri", FieldType::text())
        .field("TypeCode", FieldType::composite(code))
        .finish()
        .unwrap();
    let evidence = r
        .composite("Qiif.Evidence")
        .unwrap()
        .field("Contract", FieldType::composite(document_reference))
        .field("InvoiceGroup", FieldType::list(FieldType::composite(related_invoice)))
        .field(
            "OtherGroup",
            FieldType::array(FieldType::composite(document_reference)),
        )
        .finish()
        .unwrap();
    let trade_transaction = r
        .composite("Qiif.TradeTransaction")
        .unwrap()
        .field("Evidence", FieldType::composite(evidence))
        .field("LineItemGroup", FieldType::list(FieldType::composite(line_item)))
        .finish()
        .unwrap();
    let invoice_document = r
        .composite("Qiif.InvoiceDocument")
        .unwrap()
        .field("Date", FieldType::composite(date_and_time))
        .field("DocumentId", FieldType::composite(id))
        .field("TypeCode", FieldType::composite(code))
        .finish()
        .unwrap();
    let root = r
        .composite("Qiif.QiifDataObject")
        .unwrap()
        .field("InvoiceDocument", FieldType::composite(invoice_document))
        .field("NoteGroup", FieldType::collection(FieldType::composite(note)))
        .field("TradeTransaction", FieldType::composite(trade_transaction))
        .field("Attributes", FieldType::map(FieldType::text()))
        .finish()
        .unwrap();

    InvoiceTypes {
        registry: Arc::new(r),
        language,
        code,
        id,
        date_and_time,
        block_string,
        note,
        line_item,
        document_reference,
        related_invoice,
        evidence,
        trade_transaction,
        invoice_document,
        root,
    }
}

/// Code object with an identifier
pub fn code(graph: &mut ObjectGraph, types: &InvoiceTypes, identifier: &str) -> ObjectId {
    let id = graph.instantiate(types.code).unwrap();
    graph
        .set_by_name(id, "Identifier", Value::from(identifier))
        .unwrap();
    id
}

/// Line item with a description, origin code, quantity and tags
pub fn line_item(
    graph: &mut ObjectGraph,
    types: &InvoiceTypes,
    text: &str,
    quantity: Decimal,
) -> ObjectId {
    let description = graph.instantiate(types.block_string).unwrap();
    graph.set_by_name(description, "Text", Value::from(text)).unwrap();
    let origin = code(graph, types, "CZ");

    let item = graph.instantiate(types.line_item).unwrap();
    graph
        .set_by_name(item, "Description", Value::Object(description))
        .unwrap();
    graph
        .set_by_name(item, "OriginCountryCode", Value::Object(origin))
        .unwrap();
    graph
        .set_by_name(item, "Quantity", Value::Scalar(Scalar::Decimal(quantity)))
        .unwrap();
    graph
        .set_by_name(item, "Tags", Value::Seq(vec!["new".into()]))
        .unwrap();
    item
}

/// Filled-in invoice: document header, one note, two line items, attributes
pub fn sample_invoice(graph: &mut ObjectGraph, types: &InvoiceTypes) -> ObjectId {
    let type_code = code(graph, types, "380");
    let document = graph.instantiate(types.invoice_document).unwrap();
    graph
        .set_by_name(document, "TypeCode", Value::Object(type_code))
        .unwrap();

    let subject = code(graph, types, "AAI");
    let note = graph.instantiate(types.note).unwrap();
    graph.set_by_name(note, "Content", Value::from("Thanks")).unwrap();
    graph
        .set_by_name(note, "SubjectCode", Value::Object(subject))
        .unwrap();

    let first = line_item(graph, types, "Widget", Decimal::new(25, 1));
    let second = line_item(graph, types, "Gadget", Decimal::ONE);
    let transaction = graph.instantiate(types.trade_transaction).unwrap();
    graph
        .set_by_name(
            transaction,
            "LineItemGroup",
            Value::Seq(vec![Value::Object(first), Value::Object(second)]),
        )
        .unwrap();

    let root = graph.instantiate(types.root).unwrap();
    graph
        .set_by_name(root, "InvoiceDocument", Value::Object(document))
        .unwrap();
    graph
        .set_by_name(root, "NoteGroup", Value::Seq(vec![Value::Object(note)]))
        .unwrap();
    graph
        .set_by_name(root, "TradeTransaction", Value::Object(transaction))
        .unwrap();
    graph
        .set_by_name(
            root,
            "Attributes",
            Value::Map(indexmap_of([(MapKey::text("channel"), Value::from("email"))])),
        )
        .unwrap();
    root
}

/// Fresh graph over a fixture registry
pub fn graph_for(registry: &Arc<TypeRegistry>) -> ObjectGraph {
    ObjectGraph::new(Arc::clone(registry))
}
