#![no_main]

use cmpool::{Span, SpanList};
use libfuzzer_sys::{arbitrary::Arbitrary, fuzz_target};

const SPANS: usize = 32;

#[derive(Debug, Arbitrary)]
enum Action {
    PushFront { span: u8, list: bool },
    PushBack { span: u8, list: bool },
    InsertBefore { span: u8, at: u8, list: bool },
    Erase { span: u8 },
    PopFront { list: bool },
    Move { span: u8 },
}

fuzz_target!(|actions: Vec<Action>| {
    let spans: Vec<_> = (0..SPANS).map(|id| Span::new(id, 1)).collect();
    let lists = [SpanList::new(), SpanList::new()];
    let mut models: [Vec<usize>; 2] = [Vec::new(), Vec::new()];

    let owner = |models: &[Vec<usize>; 2], id: usize| {
        models.iter().position(|model| model.contains(&id))
    };

    for action in actions {
        match action {
            Action::PushFront { span, list } => {
                let id = span as usize % SPANS;
                if owner(&models, id).is_none() {
                    lists[list as usize].lock().push_front(&spans[id]);
                    models[list as usize].insert(0, id);
                }
            }
            Action::PushBack { span, list } => {
                let id = span as usize % SPANS;
                if owner(&models, id).is_none() {
                    lists[list as usize].lock().push_back(&spans[id]);
                    models[list as usize].push(id);
                }
            }
            Action::InsertBefore { span, at, list } => {
                let (id, at) = (span as usize % SPANS, at as usize % SPANS);
                let model = &models[list as usize];
                if owner(&models, id).is_none()
                    && let Some(pos) = model.iter().position(|&x| x == at)
                {
                    lists[list as usize].lock().insert(Some(&spans[at]), &spans[id]);
                    models[list as usize].insert(pos, id);
                }
            }
            Action::Erase { span } => {
                let id = span as usize % SPANS;
                if let Some(index) = owner(&models, id) {
                    lists[index].lock().erase(&spans[id]);
                    models[index].retain(|&x| x != id);
                }
            }
            Action::PopFront { list } => {
                let popped = lists[list as usize].lock().pop_front();
                let model = &mut models[list as usize];
                let expected = (!model.is_empty()).then(|| model.remove(0));
                assert_eq!(popped.map(Span::page_id), expected);
            }
            Action::Move { span } => {
                let id = span as usize % SPANS;
                if let Some(from) = owner(&models, id) {
                    let to = 1 - from;
                    let (mut src, mut dst) = (lists[from].lock(), lists[to].lock());
                    src.erase(&spans[id]);
                    dst.push_back(&spans[id]);
                    models[from].retain(|&x| x != id);
                    models[to].push(id);
                }
            }
        }

        for (list, model) in lists.iter().zip(&models) {
            let list = list.lock();
            let forward: Vec<_> = list.iter().map(Span::page_id).collect();
            assert_eq!(&forward, model);
            let backward: Vec<_> = list.iter().rev().map(Span::page_id).collect();
            assert!(backward.iter().eq(model.iter().rev()));
            assert_eq!(list.is_empty(), model.is_empty());
            assert_eq!(list.begin() == list.end(), model.is_empty());
        }
    }
});
