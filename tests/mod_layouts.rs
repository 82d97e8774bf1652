use docbench::config::{BenchConfig, DataConfig, QueriesConfig};
use docbench::generate::Generator;
use docbench::model::{self, CompanyRecord, PersonRecord};
use docbench::query::Outcome;
use docbench::{DocumentStore, Layout, MemoryStore, QueryKind};
use mongodb::bson::Document;
use std::collections::HashMap;

fn data() -> DataConfig {
    DataConfig { num_companies: 5, num_persons_per_company: 12, seed: Some(2024), ..DataConfig::default() }
}

fn load(layout: Layout) -> (MemoryStore, String) {
    let cfg = BenchConfig { data: data(), ..BenchConfig::default() };
    let store = MemoryStore::new();
    let name = layout.collection(&cfg.collections).to_string();
    let mut generator = Generator::from_config(&cfg.data);
    store.insert_many(&name, layout.documents(&mut generator).unwrap()).unwrap();
    (store, name)
}

fn run(store: &MemoryStore, col: &str, layout: Layout, kind: QueryKind) -> Outcome {
    store.execute(col, &layout.operation(kind, &QueriesConfig::default())).unwrap()
}

#[test]
fn both_layouts_agree_on_full_names() {
    let (ps, pc) = load(Layout::PersonCentric);
    let (cs, cc) = load(Layout::CompanyCentric);
    let mut from_persons: Vec<(String, String)> = run(&ps, &pc, Layout::PersonCentric, QueryKind::FullNames)
        .documents()
        .iter()
        .map(|d| {
            let company = d.get_document("company").unwrap().get_str("name").unwrap().to_string();
            (d.get_str("full_name").unwrap().to_string(), company)
        })
        .collect();
    let mut from_companies: Vec<(String, String)> = run(&cs, &cc, Layout::CompanyCentric, QueryKind::FullNames)
        .documents()
        .iter()
        .map(|d| (d.get_str("full_name").unwrap().to_string(), d.get_str("company_name").unwrap().to_string()))
        .collect();
    assert_eq!(from_persons.len(), 60);
    assert!(from_persons.iter().all(|(n, _)| n.contains(' ')));
    // same seed, same generator: the datasets are identical up to shape
    from_persons.sort();
    from_companies.sort();
    assert_eq!(from_persons, from_companies);
}

#[test]
fn employee_counts_match_dataset() {
    for layout in Layout::ALL {
        let (store, col) = load(layout);
        let rows = run(&store, &col, layout, QueryKind::EmployeeCounts);
        let counts: HashMap<String, i64> = rows
            .documents()
            .iter()
            .map(|d| {
                let n = match d.get("num_employees") {
                    Some(mongodb::bson::Bson::Int32(n)) => i64::from(*n),
                    Some(mongodb::bson::Bson::Int64(n)) => *n,
                    other => panic!("unexpected count {other:?}"),
                };
                (d.get_str("company_name").unwrap().to_string(), n)
            })
            .collect();
        assert_eq!(counts.len(), 5, "{layout:?}");
        assert!(counts.values().all(|n| *n == 12));
        assert_eq!(counts.values().sum::<i64>(), 60);
        assert!(rows.documents().iter().all(|d| !d.contains_key("_id")));
    }
}

#[test]
fn age_update_touches_only_older_persons() {
    let (store, col) = load(Layout::PersonCentric);
    let before: Vec<PersonRecord> =
        store.find_all(&col).unwrap().into_iter().map(|d| model::from_document(d).unwrap()).collect();
    let older = before.iter().filter(|r| r.person.birth_year < 1988).count() as u64;
    let report = run(&store, &col, Layout::PersonCentric, QueryKind::AgeUpdate);
    assert!(report.affected() <= older);
    let after: Vec<PersonRecord> =
        store.find_all(&col).unwrap().into_iter().map(|d| model::from_document(d).unwrap()).collect();
    for (b, a) in before.iter().zip(&after) {
        if b.person.birth_year < 1988 {
            assert_eq!(a.person.age, 30);
        } else {
            assert_eq!(a, b);
        }
    }
}

#[test]
fn age_update_rewrites_embedded_employees() {
    let (store, col) = load(Layout::CompanyCentric);
    let before: Vec<CompanyRecord> =
        store.find_all(&col).unwrap().into_iter().map(|d| model::from_document(d).unwrap()).collect();
    run(&store, &col, Layout::CompanyCentric, QueryKind::AgeUpdate);
    let after: Vec<CompanyRecord> =
        store.find_all(&col).unwrap().into_iter().map(|d| model::from_document(d).unwrap()).collect();
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(a.employees.len(), b.employees.len());
        for (pb, pa) in b.employees.iter().zip(&a.employees) {
            let want = if pb.birth_year < 1988 { 30 } else { pb.age };
            assert_eq!(pa.age, want);
            assert_eq!((pa.first_name.as_str(), pa.last_name.as_str()), (pb.first_name.as_str(), pb.last_name.as_str()));
        }
    }
}

fn company_names(store: &MemoryStore, col: &str, layout: Layout) -> Vec<String> {
    let docs: Vec<Document> = store.find_all(col).unwrap();
    docs.iter()
        .map(|d| match layout {
            Layout::PersonCentric => d.get_document("company").unwrap().get_str("name").unwrap().to_string(),
            Layout::CompanyCentric => d.get_str("name").unwrap().to_string(),
        })
        .collect()
}

#[test]
fn rename_appends_suffix_each_time_it_runs() {
    for layout in Layout::ALL {
        let (store, col) = load(layout);
        let original = company_names(&store, &col, layout);
        let first = run(&store, &col, layout, QueryKind::CompanyRename);
        assert_eq!(first.affected(), original.len() as u64);
        let once = company_names(&store, &col, layout);
        for (o, n) in original.iter().zip(&once) {
            assert_eq!(n, &format!("{o} Company"));
        }
        run(&store, &col, layout, QueryKind::CompanyRename);
        let twice = company_names(&store, &col, layout);
        assert!(twice.iter().all(|n| n.ends_with(" Company Company")));
    }
}

#[test]
fn configured_query_constants_are_used() {
    let (store, col) = load(Layout::CompanyCentric);
    let q = QueriesConfig { age_threshold_year: 2100, fixed_age: 1, company_suffix: " GmbH".into() };
    store.execute(&col, &Layout::CompanyCentric.operation(QueryKind::AgeUpdate, &q)).unwrap();
    store.execute(&col, &Layout::CompanyCentric.operation(QueryKind::CompanyRename, &q)).unwrap();
    for d in store.find_all(&col).unwrap() {
        let r: CompanyRecord = model::from_document(d).unwrap();
        assert!(r.name.ends_with(" GmbH"));
        assert!(r.employees.iter().all(|p| p.age == 1));
    }
}
