//! The entry point: discover the bindings in a document and apply them.

use std::{collections::BTreeMap, rc::Rc};

use adom::Document;
use kstring::KString;

use chj_util::{dt, warn};

use crate::{
    action::{ActionContext, bind_actions},
    config::Options,
    directive::DirectiveProcessor,
    discovery::{discover_templates, discover_interactions},
    error::{ConfigurationError, SprinkleError},
    event_loop::EventLoop,
    expr::Evaluator,
    form::bind_form,
    http::{ReqwestTransport, Transport},
    methods::MethodRegistry,
    store::{PathStore, Store},
    template::{CompiledTemplate, bind_template},
};

/// A running instance.
pub struct Sprinkle {
    pub store: Rc<dyn Store>,
    pub methods: Rc<MethodRegistry>,
    /// By template id.
    pub templates: BTreeMap<KString, CompiledTemplate>,
    pub event_loop: Rc<EventLoop>,
    /// Everything that failed to bind. The units concerned are left
    /// unbound, the others are unaffected.
    pub errors: Vec<SprinkleError>,
}

impl Sprinkle {
    /// Failures from renders and actions since the last call.
    pub fn take_failures(&self) -> Vec<SprinkleError> {
        self.event_loop.take_failures()
    }

    /// Complete all pending asynchronous actions.
    pub async fn run_until_idle(&self) {
        self.event_loop.run_until_idle().await
    }
}

/// Bind all templates, actions and forms in `doc`. Only invalid
/// settings make this fail; errors in single units are collected in
/// `Sprinkle::errors`. Calling it again on the same document binds
/// whatever is found again, without regard to earlier bindings.
pub fn start(doc: &Rc<Document>, options: Options) -> Result<Sprinkle, SprinkleError> {
    let Options { settings, method_overrides, transport } = options;
    settings.check()?;

    let store: Rc<dyn Store> = Rc::new(PathStore::default());
    let transport: Rc<dyn Transport> = match transport {
        Some(t) => t,
        None => Rc::new(ReqwestTransport::default()),
    };
    let defaults = MethodRegistry::defaults(store.clone(), transport);
    let methods = Rc::new(match method_overrides {
        Some(overrides) => defaults.merge(overrides(&store)),
        None => defaults,
    });
    let evaluator = Rc::new(Evaluator::new());
    let processor = Rc::new(DirectiveProcessor::new(&settings, evaluator.clone(), methods.clone()));
    let event_loop = Rc::new(EventLoop::new(store.clone()));

    let discovery = discover_templates(doc, &settings);
    let mut errors = discovery.errors;

    let mut declarations = Vec::new();
    for decl in discovery.templates {
        if let Some(state) = &decl.initial_state {
            if let Err(source) = store.commit(&decl.namespace, state.clone()) {
                errors.push(ConfigurationError::InitialCommit { id: decl.id.clone(), source }.into());
                continue
            }
        }
        declarations.push(decl);
    }

    let mut templates = BTreeMap::new();
    for decl in &declarations {
        match bind_template(doc, &store, &processor, &settings.container_tag, decl,
                            event_loop.failures()) {
            Ok(t) => {
                dt!("bound template {:?} to namespace {:?}", t.id, t.namespace);
                if let Some(old) = templates.insert(t.id.clone(), t) {
                    warn!("duplicate template id {:?}, replacing the earlier entry", old.id);
                }
            }
            Err(e) => errors.push(e),
        }
    }

    let interactions = discover_interactions(doc, &settings);
    errors.extend(interactions.errors);
    let ctx = ActionContext {
        store: store.clone(),
        methods: methods.clone(),
        evaluator,
        event_loop: event_loop.clone(),
    };
    for binding in &interactions.actions {
        dt!("binding {} action(s) on {:?}", binding.actions.len(), binding.node);
        errors.extend(bind_actions(doc, binding, &ctx));
    }
    for form in &interactions.forms {
        dt!("binding form {:?} with {} field(s)", form.namespace, form.fields.len());
        bind_form(doc, form, &store, event_loop.failures());
    }

    Ok(Sprinkle { store, methods, templates, event_loop, errors })
}
